#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate concurrent_btree;

use concurrent_btree::ConcurrentBTree;

fn check<const CAPACITY: usize>(data: &[u64], model: &std::collections::BTreeMap<u64, u64>) {
    let tree = ConcurrentBTree::<u64, u64, CAPACITY>::default();

    for item in data {
        tree.insert(*item, item.wrapping_mul(3));
    }

    for (key, value) in model {
        assert_eq!(tree.get(key), Some(*value));
    }

    for item in data {
        let absent = item.wrapping_add(1);
        if !model.contains_key(&absent) {
            assert_eq!(tree.get(&absent), None);
        }
    }
}

fuzz_target!(|data: Vec<u64>| {
    let mut model = std::collections::BTreeMap::default();

    for item in &data {
        model.insert(*item, item.wrapping_mul(3));
    }

    check::<2>(&data, &model);
    check::<3>(&data, &model);
    check::<5>(&data, &model);
    check::<8>(&data, &model);
});
