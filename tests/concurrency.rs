//! Multi-threaded tests: striped node locks and the structural lock

use range_digest::{Digest, RevisionTree};
use std::thread;

const THREADS: u64 = 8;
const PER_THREAD: u64 = 500;

fn value_of(key: u64) -> u64 {
    Digest::of(&key.to_le_bytes()).value()
}

#[test]
fn test_parallel_inserts_match_sequential() {
    let shared = RevisionTree::new(3, 0, 512).unwrap();
    let sequential = RevisionTree::new(3, 0, 512).unwrap();

    // interleaved keys so every thread keeps triggering growth
    thread::scope(|s| {
        for t in 0..THREADS {
            let tree = &shared;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    let key = i * THREADS + t;
                    tree.insert(key, value_of(key)).unwrap();
                }
            });
        }
    });

    for key in 0..THREADS * PER_THREAD {
        sequential.insert(key, value_of(key)).unwrap();
    }

    assert_eq!(shared.count(), THREADS * PER_THREAD);
    assert_eq!(shared.root(), sequential.root());
    assert_eq!(shared.range(), sequential.range());
    assert!(shared.diff(&sequential).unwrap().is_empty());
    shared.check_consistency().unwrap();
}

#[test]
fn test_parallel_insert_and_remove() {
    let tree = RevisionTree::new(3, 0, 4096).unwrap();
    for key in 0..2000u64 {
        tree.insert(key, value_of(key)).unwrap();
    }

    thread::scope(|s| {
        let tree = &tree;
        s.spawn(move || {
            for key in 0..2000u64 {
                tree.remove(key, value_of(key)).unwrap();
            }
        });
        s.spawn(move || {
            for key in 2000..4000u64 {
                tree.insert(key, value_of(key)).unwrap();
            }
        });
    });

    let expected = RevisionTree::new(3, 0, 4096).unwrap();
    for key in 2000..4000u64 {
        expected.insert(key, value_of(key)).unwrap();
    }
    assert_eq!(tree.count(), 2000);
    assert!(tree.diff(&expected).unwrap().is_empty());
}

#[test]
fn test_crossed_diffs_while_growing() {
    let a = RevisionTree::new(2, 0, 64).unwrap();
    let b = RevisionTree::new(2, 0, 64).unwrap();

    thread::scope(|s| {
        let (a, b) = (&a, &b);
        s.spawn(move || {
            for key in 0..2000u64 {
                a.insert(key, key).unwrap();
            }
        });
        s.spawn(move || {
            for key in 0..2000u64 {
                b.insert(key, key).unwrap();
            }
        });
        s.spawn(move || {
            for _ in 0..200 {
                a.diff(b).unwrap();
            }
        });
        s.spawn(move || {
            for _ in 0..200 {
                b.diff(a).unwrap();
            }
        });
        s.spawn(move || {
            for _ in 0..50 {
                let copy = RevisionTree::from_buffer(&a.serialize_binary()).unwrap();
                copy.check_consistency().unwrap();
            }
        });
    });

    assert!(a.diff(&b).unwrap().is_empty());
    assert_eq!(a.count(), 2000);
}

#[test]
fn test_remove_batches_alongside_inserts_and_diffs() {
    let tree = RevisionTree::new(3, 0, 4096).unwrap();
    let reference = RevisionTree::new(3, 0, 4096).unwrap();
    for key in 0..2000u64 {
        tree.insert(key, value_of(key)).unwrap();
        reference.insert(key, value_of(key)).unwrap();
    }

    thread::scope(|s| {
        let (tree, reference) = (&tree, &reference);
        s.spawn(move || {
            for start in (0..1000u64).step_by(50) {
                let batch: Vec<_> = (start..start + 50).map(|k| (k, value_of(k))).collect();
                tree.remove_batch(&batch).unwrap();
            }
        });
        s.spawn(move || {
            for key in 1000..2000u64 {
                tree.remove(key, value_of(key)).unwrap();
            }
        });
        s.spawn(move || {
            for key in 2000..4000u64 {
                tree.insert(key, value_of(key)).unwrap();
            }
        });
        s.spawn(move || {
            for _ in 0..100 {
                tree.diff(reference).unwrap();
                tree.check_consistency().unwrap();
            }
        });
    });

    let expected = RevisionTree::new(3, 0, 4096).unwrap();
    for key in 2000..4000u64 {
        expected.insert(key, value_of(key)).unwrap();
    }
    assert_eq!(tree.count(), 2000);
    assert_eq!(tree.root(), expected.root());
    assert!(tree.diff(&expected).unwrap().is_empty());
    tree.check_consistency().unwrap();
}
