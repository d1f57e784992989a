use handle_collections::{BidiIterator, CollectionError, LinkedMap, LruInsert, LruMap};

#[test]
fn insertion_order_survives_reinsert_and_removal() {
    let mut m = LinkedMap::new();
    for (i, k) in ["one", "two", "three", "four"].into_iter().enumerate() {
        m.insert(k.to_string(), i);
    }
    // Re-insert must update the value in place.
    assert_eq!(m.insert("two".to_string(), 20), Some(1));
    assert_eq!(m.remove("three"), Some(2));
    m.insert("three".to_string(), 30);

    let order: Vec<_> = m.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    assert_eq!(order, [("one", 0), ("two", 20), ("four", 3), ("three", 30)]);
    assert_eq!(m.index_of("four"), Some(2));
    m.validate();
}

#[test]
fn ordered_iter_fails_fast_after_direct_insert() {
    let mut m: LinkedMap<u32, u32> = (0..4).map(|i| (i, i * i)).collect();
    let mut it = m.ordered_iter();
    assert_eq!(it.next(&m), Ok(Some((&0, &0))));
    m.insert(99, 0);
    assert_eq!(it.next(&m), Err(CollectionError::ConcurrentModification));
    assert_eq!(it.remove(&mut m), Err(CollectionError::ConcurrentModification));
}

#[test]
fn ordered_iter_updates_values_and_removes() {
    let mut m: LinkedMap<u32, u32> = (0..6).map(|i| (i, i)).collect();
    let mut it = m.ordered_iter();
    while let Some((k, _)) = it.next(&m).unwrap() {
        let k = *k;
        if k % 3 == 0 {
            it.remove(&mut m).unwrap();
        } else {
            assert_eq!(it.set_value(&mut m, k * 100), Ok(k));
        }
    }
    let rest: Vec<_> = m.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(rest, [(1, 100), (2, 200), (4, 400), (5, 500)]);
    m.validate();
}

#[test]
fn backwards_walk_from_the_young_end() {
    let m: LinkedMap<char, ()> = "abc".chars().map(|c| (c, ())).collect();
    let mut it = m.ordered_iter_from_back();
    assert!(!it.has_next(&m).unwrap());
    let mut seen = String::new();
    while let Some((k, _)) = it.previous(&m).unwrap() {
        seen.push(*k);
    }
    assert_eq!(seen, "cba");
}

#[test]
fn iterator_bound_to_its_own_map() {
    let a: LinkedMap<u8, u8> = [(1, 1)].into_iter().collect();
    let b: LinkedMap<u8, u8> = [(1, 1)].into_iter().collect();
    let mut it = a.ordered_iter();
    assert_eq!(it.next(&b), Err(CollectionError::WrongOwner));
}

#[test]
fn equality_is_order_sensitive() {
    let ab: LinkedMap<&str, i32> = [("a", 1), ("b", 2)].into_iter().collect();
    let ba: LinkedMap<&str, i32> = [("b", 2), ("a", 1)].into_iter().collect();
    assert_ne!(ab, ba);
    assert_eq!(ab, ab.clone());
}

#[test]
fn read_only_view_rejects_mutation() {
    let m: LinkedMap<&str, i32> = [("a", 1)].into_iter().collect();
    let mut view = m.unmodifiable();
    assert_eq!(view.get("a"), Some(&1));
    assert!(matches!(view.insert("b", 2), Err(CollectionError::Unsupported(_))));
    assert!(matches!(view.remove("a"), Err(CollectionError::Unsupported(_))));
    assert!(matches!(view.clear(), Err(CollectionError::Unsupported(_))));
    assert_eq!(view.len(), 1);
}

#[test]
fn lru_cache_workflow() {
    let mut cache = LruMap::new(2).unwrap();
    cache.insert("a", 1);
    cache.insert("b", 2);
    assert_eq!(cache.get("a"), Some(&1));
    match cache.insert("c", 3) {
        LruInsert::Evicted { key, value } => assert_eq!((key, value), ("b", 2)),
        other => panic!("expected eviction, got {other:?}"),
    }
    let order: Vec<_> = cache.iter().map(|(k, _)| *k).collect();
    assert_eq!(order, ["a", "c"]);
}
