#![cfg(test)]

// Property tests for LinkedMap kept inside the crate so they can check ring
// integrity through `validate` after every step.

use crate::iteration::BidiIterator;
use crate::linked_map::LinkedMap;
use proptest::prelude::*;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    PopFront,
    PopBack,
    RemoveIndex(usize),
    Neighbours(usize),
    RemoveOddWhileIterating,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Get),
            1 => "[a-z]{0,5}".prop_map(OpI::Contains),
            1 => Just(OpI::PopFront),
            1 => Just(OpI::PopBack),
            1 => (0usize..10).prop_map(OpI::RemoveIndex),
            1 => idx.clone().prop_map(OpI::Neighbours),
            1 => Just(OpI::RemoveOddWhileIterating),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S: BuildHasher>(
    mut sut: LinkedMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    // Insertion-ordered model.
    let mut model: Vec<(Key, i32)> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                let prev = sut.insert(k.clone(), v);
                match model.iter_mut().find(|(mk, _)| *mk == k) {
                    Some((_, mv)) => {
                        prop_assert_eq!(prev, Some(*mv));
                        *mv = v;
                    }
                    None => {
                        prop_assert_eq!(prev, None);
                        model.push((k, v));
                    }
                }
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                let got = sut.remove(&k);
                let want = model
                    .iter()
                    .position(|(mk, _)| *mk == k)
                    .map(|p| model.remove(p).1);
                prop_assert_eq!(got, want);
            }
            OpI::Get(i) => {
                let k = key_from(pool, i);
                let want = model.iter().find(|(mk, _)| *mk == k).map(|(_, v)| v);
                prop_assert_eq!(sut.get(&k), want);
                prop_assert_eq!(
                    sut.index_of(&k),
                    model.iter().position(|(mk, _)| *mk == k)
                );
            }
            OpI::Contains(s) => {
                let has_model = model.iter().any(|(k, _)| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            OpI::PopFront => {
                let want = if model.is_empty() {
                    None
                } else {
                    Some(model.remove(0))
                };
                prop_assert_eq!(sut.pop_front(), want);
            }
            OpI::PopBack => {
                prop_assert_eq!(sut.pop_back(), model.pop());
            }
            OpI::RemoveIndex(i) => {
                let got = sut.remove_index(i).ok();
                let want = (i < model.len()).then(|| model.remove(i));
                prop_assert_eq!(got, want);
            }
            OpI::Neighbours(i) => {
                let k = key_from(pool, i);
                match model.iter().position(|(mk, _)| *mk == k) {
                    Some(p) => {
                        prop_assert_eq!(sut.next_key(&k), model.get(p + 1).map(|(k, _)| k));
                        let before = p.checked_sub(1).and_then(|q| model.get(q));
                        prop_assert_eq!(sut.previous_key(&k), before.map(|(k, _)| k));
                    }
                    None => {
                        prop_assert!(sut.next_key(&k).is_none());
                        prop_assert!(sut.previous_key(&k).is_none());
                    }
                }
            }
            OpI::RemoveOddWhileIterating => {
                let mut it = sut.ordered_iter();
                loop {
                    let odd = match it.next(&sut) {
                        Ok(Some((_, v))) => v % 2 != 0,
                        Ok(None) => break,
                        Err(e) => return Err(TestCaseError::fail(e.to_string())),
                    };
                    if odd {
                        it.remove(&mut sut)
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    }
                }
                model.retain(|(_, v)| v % 2 == 0);
            }
            OpI::Iterate => {
                let forward: Vec<_> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(&forward, &model);
                let backward: Vec<_> = sut.iter().rev().map(|(k, _)| k.clone()).collect();
                let model_back: Vec<_> = model.iter().rev().map(|(k, _)| k.clone()).collect();
                prop_assert_eq!(backward, model_back);
            }
        }

        // Post-conditions after each op
        sut.validate();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.front().map(|(k, _)| k), model.first().map(|(k, _)| k));
        prop_assert_eq!(sut.back().map(|(k, _)| k), model.last().map(|(k, _)| k));
    }
    Ok(())
}

// Property: state-machine equivalence against an insertion-ordered Vec.
// - Re-inserting a present key replaces its value and keeps its position.
// - Removal through the map, by index, from either end, or through an
//   ordered iterator keeps the ring consistent (`validate`).
// - Forward and reverse iteration match the model order exactly.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(LinkedMap::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher so every entry shares a chain.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_collisions((pool, ops) in arb_scenario()) {
        run_scenario(LinkedMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}
