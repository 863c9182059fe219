use std::thread::scope;
use std::time::Instant;

use concurrent_btree::ConcurrentBTree;

const CAPACITY: usize = 64;
const THREADS: u64 = 8;
// two full leaves worth of keys per thread
const PER_THREAD: u64 = 128;
const TOTAL: u64 = THREADS * PER_THREAD;

fn encode_u64_be(x: u64) -> Vec<u8> {
    x.to_be_bytes().to_vec()
}

fn writer(tree: ConcurrentBTree<Vec<u8>, Vec<u8>, CAPACITY>, min: u64, max: u64) {
    for i in min..max {
        tree.insert(encode_u64_be(i), encode_u64_be(2 * i));
    }

    for i in min..max {
        let value = tree.get(&encode_u64_be(i)[..]);
        assert_eq!(value, Some(encode_u64_be(2 * i)), "failed to read back key {i}");
    }
}

fn main() {
    let tree = ConcurrentBTree::default();

    let before = Instant::now();
    scope(|s| {
        let mut handles = vec![];

        for t in 0..THREADS {
            let min = t * PER_THREAD;
            let max = (t + 1) * PER_THREAD;
            let tree = tree.clone();
            let handle = s.spawn(move || writer(tree, min, max));
            handles.push(handle);
        }

        for handle in handles.into_iter() {
            handle.join().unwrap()
        }
    });

    let elapsed = before.elapsed();

    println!(
        "with {} writers, took {:?} to insert and read back {} keys",
        THREADS, elapsed, TOTAL
    );
    println!("multithread writers passed");
}
