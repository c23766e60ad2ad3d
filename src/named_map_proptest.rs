#![cfg(test)]

// Property tests for NamedMap kept inside the crate so the stale-handle and
// collision checks can use crate-private pieces.

use crate::named_map::{Handle, InsertError, NamedMap};
use core::hash::BuildHasher;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;
use std::hash::Hasher;

// Pool-indexed operations to improve shrinking: indices shrink to earlier names,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z0-9_]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Find),
            prop_oneof![contains_pool, "[a-z0-9_]{0,5}".prop_map(|s| s)].prop_map(OpI::Contains),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against an ordered Vec model.
// Invariants exercised across random operation sequences:
// - Duplicate names are rejected; on success a unique stable Handle is returned.
// - `find`/`contains` parity and handle stability for live entries.
// - `remove` returns the owned `(name, value)` matching the model and invalidates the handle.
// - `iter` yields live entries exactly in model (insertion) order.
// - Stale handles never resolve; `len`/`is_empty` parity with the model after each op.
fn run_scenario<S: BuildHasher>(
    mut sut: NamedMap<i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: Vec<(String, i32)> = Vec::new();
    let mut live: HashMap<String, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let name = pool[i].clone();
                let already = model.iter().any(|(n, _)| *n == name);
                match sut.insert(name.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        let prev = live.insert(name.clone(), h);
                        prop_assert!(prev.is_none());
                        model.push((name, v));
                    }
                    Err(InsertError::DuplicateName(n)) => {
                        prop_assert!(already, "duplicate error only when name exists");
                        prop_assert_eq!(n, name);
                    }
                }
            }
            OpI::Remove(i) => {
                let name = &pool[i];
                match model.iter().position(|(n, _)| n == name) {
                    Some(pos) => {
                        let (mn, mv) = model.remove(pos);
                        let (sn, sv) = sut.remove(name).expect("present for removal");
                        prop_assert_eq!(sn, mn);
                        prop_assert_eq!(sv, mv);
                        if let Some(h) = live.remove(name) {
                            stale.push(h);
                        }
                    }
                    None => prop_assert!(sut.remove(name).is_none()),
                }
            }
            OpI::Find(i) => {
                let name = &pool[i];
                let found = sut.find(name);
                prop_assert_eq!(found.is_some(), model.iter().any(|(n, _)| n == name));
                if let Some(h) = found {
                    prop_assert_eq!(Some(&h), live.get(name));
                }
            }
            OpI::Contains(s) => {
                prop_assert_eq!(sut.contains(&s), model.iter().any(|(n, _)| *n == s));
            }
            OpI::Mutate(i, d) => {
                let name = &pool[i];
                if let Some(&h) = live.get(name) {
                    match h.value_mut(&mut sut) {
                        Some(vr) => *vr = vr.saturating_add(d),
                        None => prop_assert!(false, "live handle should resolve"),
                    }
                    if let Some((_, mv)) = model.iter_mut().find(|(n, _)| n == name) {
                        *mv = mv.saturating_add(d);
                    }
                }
            }
            OpI::Iterate => {
                let seen: Vec<(String, i32)> =
                    sut.iter().map(|(_, n, v)| (n.to_string(), *v)).collect();
                prop_assert_eq!(&seen, &model);
            }
        }

        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(NamedMap::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
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
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(NamedMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}
