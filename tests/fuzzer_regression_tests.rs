/// Tests are placed here when the fuzzer finds bugs, so we can re-play them deterministically
/// even if tested on a machine without a fuzzer corpus loaded etc...

#[test]
fn test_00() {
    // the key equal to the first separator must route right after the root split
    let map = concurrent_btree::ConcurrentBTree::<_, _, 2>::default();
    map.insert(10, 10);
    map.insert(20, 20);
    map.insert(30, 30);

    assert_eq!(map.get(&10), Some(10));
    assert_eq!(map.get(&20), Some(20));
    assert_eq!(map.get(&30), Some(30));
    assert_eq!(map.get(&15), None);
    assert_eq!(map.get(&25), None);

    assert_eq!(map.insert(20, 21), Some(20));
    assert_eq!(map.get(&20), Some(21));
}

#[test]
fn test_01() {
    let map = concurrent_btree::ConcurrentBTree::<_, _, 3>::default();
    let mut model = std::collections::BTreeMap::new();

    let items = [95, 126, 2, 73, 0, 106, 54, 73, 126, 1, 96, 55, 74];

    for item in items {
        assert_eq!(map.insert(item, item * 2), model.insert(item, item * 2));
    }

    for key in 0..=130 {
        assert_eq!(map.get(&key), model.get(&key).copied(), "mismatch for key {key}");
    }
}

#[test]
fn test_02() {
    // descending inserts keep hitting the leftmost leaf and force index splits
    let map = concurrent_btree::ConcurrentBTree::<_, _, 2>::default();
    let mut model = std::collections::BTreeMap::new();

    for item in (0_u8..=64).rev().step_by(3) {
        map.insert(item, ());
        model.insert(item, ());
    }
    for item in (0_u8..=64).step_by(2) {
        assert_eq!(map.insert(item, ()), model.insert(item, ()));
    }

    for key in 0..=u8::MAX {
        assert_eq!(map.get(&key), model.get(&key).copied(), "mismatch for key {key}");
    }
}
