#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate arbitrary;
extern crate concurrent_btree;

use arbitrary::Arbitrary;

const KEYSPACE: u64 = 128;

#[derive(Debug)]
enum Op {
    Insert { key: u64, value: u64 },
    Get { key: u64 },
}

impl<'a> Arbitrary<'a> for Op {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(if u.ratio(2, 3)? {
            Op::Insert {
                key: u.int_in_range(0..=KEYSPACE)?,
                value: u.int_in_range(0..=KEYSPACE)?,
            }
        } else {
            Op::Get {
                key: u.int_in_range(0..=KEYSPACE)?,
            }
        })
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let tree = concurrent_btree::ConcurrentBTree::<_, _, 3>::default();
    let mut model = std::collections::BTreeMap::new();

    for op in ops {
        match op {
            Op::Insert { key, value } => {
                assert_eq!(tree.insert(key, value), model.insert(key, value));
            }
            Op::Get { key } => {
                assert_eq!(tree.get(&key), model.get(&key).copied());
            }
        };

        for (key, value) in &model {
            assert_eq!(tree.get(key), Some(*value));
        }
    }

    for key in 0..=KEYSPACE {
        assert_eq!(tree.get(&key), model.get(&key).copied());
    }
});
