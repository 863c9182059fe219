//! Property-based tests for `ConcurrentBTree`.
//!
//! Every sequence of operations is replayed against `BTreeMap` as an oracle,
//! for several node capacities so that small trees split early and often.

mod common;

use std::collections::BTreeMap;

use concurrent_btree::ConcurrentBTree;
use proptest::prelude::*;

/// Keys come from a narrow range so that updates and hits are frequent.
const KEYSPACE: u16 = 512;

/// Operations for random testing.
#[derive(Debug, Clone)]
enum Op {
    Insert(u16, u32),
    Get(u16),
}

fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            3 => (0..KEYSPACE, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
            2 => (0..KEYSPACE).prop_map(Op::Get),
        ],
        0..=max_ops,
    )
}

/// Strategy for big-endian byte keys of varying width, which sort by byte
/// order rather than numerically when widths differ.
fn byte_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=6)
}

fn check_against_model<const CAPACITY: usize>(ops: &[Op]) -> Result<(), TestCaseError> {
    let tree = ConcurrentBTree::<u16, u32, CAPACITY>::default();
    let mut model = BTreeMap::new();

    for op in ops {
        match *op {
            Op::Insert(key, value) => {
                prop_assert_eq!(tree.insert(key, value), model.insert(key, value));
            }
            Op::Get(key) => {
                prop_assert_eq!(tree.get(&key), model.get(&key).copied());
            }
        }
    }

    for (key, value) in &model {
        prop_assert_eq!(tree.get(key), Some(*value));
    }
    for key in 0..KEYSPACE {
        prop_assert_eq!(tree.get(&key), model.get(&key).copied());
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn matches_model_capacity_2(ops in operations(400)) {
        common::init_tracing();
        check_against_model::<2>(&ops)?;
    }

    #[test]
    fn matches_model_capacity_3(ops in operations(400)) {
        check_against_model::<3>(&ops)?;
    }

    #[test]
    fn matches_model_capacity_8(ops in operations(400)) {
        check_against_model::<8>(&ops)?;
    }

    #[test]
    fn matches_model_default_capacity(ops in operations(1000)) {
        check_against_model::<64>(&ops)?;
    }

    /// Inserting the same key twice returns the first value and keeps the second.
    #[test]
    fn update_returns_previous(key: u64, first: u64, second: u64) {
        let tree = ConcurrentBTree::<u64, u64, 4>::default();

        prop_assert_eq!(tree.insert(key, first), None);
        prop_assert_eq!(tree.insert(key, second), Some(first));
        prop_assert_eq!(tree.get(&key), Some(second));
    }

    /// Byte-string keys are found through their borrowed slice form.
    #[test]
    fn byte_keys_match_model(pairs in prop::collection::vec((byte_key(), any::<u64>()), 0..=300)) {
        let tree = ConcurrentBTree::<Vec<u8>, u64, 4>::default();
        let mut model = BTreeMap::new();

        for (key, value) in pairs {
            prop_assert_eq!(tree.insert(key.clone(), value), model.insert(key, value));
        }

        for (key, value) in &model {
            prop_assert_eq!(tree.get(key.as_slice()), Some(*value));
        }
    }
}
