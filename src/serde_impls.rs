use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt::{self, Formatter};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use crate::{CursorableList, HashConfig, HashedMap, LinkedMap};

// Size hints come from the input; never trust them for more than this.
const MAX_PREALLOCATE: usize = 4096;

fn config_for(hint: Option<usize>) -> HashConfig {
    let wanted = hint.unwrap_or(0).min(MAX_PREALLOCATE);
    HashConfig::default().initial_capacity(wanted.max(crate::config::DEFAULT_CAPACITY))
}

/// Maps that deserialization can fill through their public insert path.
trait InsertPairs<K, V>: Sized {
    fn presized(hint: Option<usize>) -> Self;
    fn insert_pair(&mut self, key: K, value: V);
}

impl<K, V, S> InsertPairs<K, V> for HashedMap<K, V, S>
where
    K: Hash + Eq,
    S: Default + BuildHasher,
{
    fn presized(hint: Option<usize>) -> Self {
        HashedMap::with_config_and_hasher(config_for(hint), S::default())
            .unwrap_or_else(|_| HashedMap::with_hasher(S::default()))
    }

    fn insert_pair(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K, V, S> InsertPairs<K, V> for LinkedMap<K, V, S>
where
    K: Hash + Eq,
    S: Default + BuildHasher,
{
    fn presized(hint: Option<usize>) -> Self {
        LinkedMap::with_config_and_hasher(config_for(hint), S::default())
            .unwrap_or_else(|_| LinkedMap::with_hasher(S::default()))
    }

    fn insert_pair(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

struct MapVisitor<M, K, V> {
    _marker: PhantomData<fn() -> (M, K, V)>,
}

impl<M, K, V> MapVisitor<M, K, V> {
    fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<'de, M, K, V> Visitor<'de> for MapVisitor<M, K, V>
where
    M: InsertPairs<K, V>,
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    type Value = M;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut values = M::presized(access.size_hint());
        while let Some((key, value)) = access.next_entry()? {
            values.insert_pair(key, value);
        }
        Ok(values)
    }
}

impl<K, V, S> Serialize for HashedMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_map(self.iter())
    }
}

impl<'de, K, V, S> Deserialize<'de> for HashedMap<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapVisitor::<Self, K, V>::new())
    }
}

/// Entries are written eldest first, so a round trip keeps insertion order.
impl<K, V, S> Serialize for LinkedMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_map(self)
    }
}

impl<'de, K, V, S> Deserialize<'de> for LinkedMap<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapVisitor::<Self, K, V>::new())
    }
}

struct ListVisitor<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize> Serialize for CursorableList<T> {
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_seq(self)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CursorableList<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(ListVisitor {
            _marker: PhantomData,
        })
    }
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for ListVisitor<T> {
    type Value = CursorableList<T>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut values = CursorableList::new();
        while let Some(v) = access.next_element()? {
            values.push_back(v);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod test {
    use crate::{CursorableList, HashedMap, LinkedMap};

    #[test]
    fn test_linked_map_keeps_order() {
        let mut map: LinkedMap<String, u8> = LinkedMap::new();
        for (i, k) in ["zeta", "alpha", "mu", "beta"].into_iter().enumerate() {
            map.insert(k.to_string(), i as u8);
        }

        let serialized = serde_json::to_string(&map).unwrap();
        assert_eq!(serialized, r#"{"zeta":0,"alpha":1,"mu":2,"beta":3}"#);
        let deserialized: LinkedMap<String, u8> = serde_json::from_str(&serialized).unwrap();

        assert_eq!(map, deserialized);
        deserialized.validate();
    }

    #[test]
    fn test_hashed_map() {
        let mut map: HashedMap<u8, u8> = HashedMap::new();
        for i in 0..5 {
            map.insert(i, 4 - i);
        }

        let serialized = serde_json::to_string(&map).unwrap();
        let deserialized: HashedMap<u8, u8> = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized.len(), 5);
        for i in 0..5 {
            assert_eq!(deserialized.get(&i), Some(&(4 - i)));
        }
    }

    #[test]
    fn test_list() {
        let list: CursorableList<i32> = [3, 1, 2].into_iter().collect();

        let serialized = serde_json::to_string(&list).unwrap();
        assert_eq!(serialized, "[3,1,2]");
        let deserialized: CursorableList<i32> = serde_json::from_str(&serialized).unwrap();

        assert_eq!(list, deserialized);
    }
}
