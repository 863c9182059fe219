#![cfg_attr(
    test,
    deny(
        missing_docs,
        future_incompatible,
        nonstandard_style,
        rust_2018_idioms,
        missing_copy_implementations,
        trivial_casts,
        trivial_numeric_casts,
        unused_qualifications,
    )
)]
#![cfg_attr(test, deny(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    // clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::decimal_literal_representation,
    clippy::doc_markdown,
    // clippy::else_if_without_else,
    clippy::empty_enum,
    clippy::explicit_into_iter_loop,
    clippy::explicit_iter_loop,
    clippy::expl_impl_clone_on_copy,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    // clippy::float_arithmetic,
    clippy::get_unwrap,
    clippy::if_not_else,
    // clippy::indexing_slicing,
    clippy::inline_always,
    // clippy::integer_arithmetic,
    clippy::invalid_upcast_comparisons,
    clippy::items_after_statements,
    clippy::manual_find_map,
    clippy::map_entry,
    clippy::map_flatten,
    clippy::match_like_matches_macro,
    clippy::match_same_arms,
    clippy::maybe_infinite_iter,
    clippy::mem_forget,
    // clippy::missing_docs_in_private_items,
    clippy::module_name_repetitions,
    // clippy::multiple_inherent_impl,
    clippy::mut_mut,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::needless_pass_by_value,
    clippy::non_ascii_literal,
    clippy::path_buf_push_overwrite,
    // clippy::print_stdout,
    clippy::redundant_closure_for_method_calls,
    // clippy::shadow_reuse,
    // clippy::shadow_same,
    // clippy::shadow_unrelated,
    clippy::single_match_else,
    clippy::string_add,
    clippy::string_add_assign,
    clippy::type_repetition_in_bounds,
    clippy::unicode_not_nfc,
    clippy::unimplemented,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding,
    clippy::wildcard_dependencies,
))]
#![cfg_attr(
    test,
    warn(
        clippy::missing_const_for_fn,
        clippy::multiple_crate_versions,
        clippy::wildcard_enum_match_arm,
    )
)]

//! An in-memory B+ tree where every node carries its own reader/writer lock,
//! so that lookups and insertions from many threads only contend on the
//! individual nodes they touch rather than on one lock around the whole map.
//!
//! Lookups descend with shared locks using lock coupling: a child is latched
//! before its parent is released, and at most two nodes are held at once.
//! Insertions descend with exclusive locks and split any full child *before*
//! stepping into it, while the parent is still write-locked. The parent is
//! therefore always able to absorb the new separator, and an insertion never
//! has to walk back up the tree. Locks are only ever taken top-down, which
//! rules out deadlock.
//!
//! The node size is chosen with the `CAPACITY` const generic on
//! [`ConcurrentBTree`]. Keys are ordered by their [`Ord`] implementation; use
//! a newtype or [`std::cmp::Reverse`] for a different order. Byte strings such
//! as `Vec<u8>` sort lexicographically, so fixed-width big-endian encodings of
//! integers keep their numeric order.
//!
//! This structure supports point lookups and insert-or-update only. There is
//! no removal, no range scan and no iteration.

#[cfg(not(feature = "fault_injection"))]
#[inline]
const fn debug_delay() -> bool {
    false
}

/// This function is useful for inducing random jitter between
/// latching a child and releasing its parent, shaking out more
/// possible interleavings quickly. It gets fully eliminated by the
/// compiler in non-test code.
#[cfg(feature = "fault_injection")]
fn debug_delay() -> bool {
    use rand::{thread_rng, Rng};

    let mut rng = thread_rng();

    match rng.gen_range(0..100) {
        0..=97 => false,
        _ => true,
    }
}

mod node;
mod tracing_helpers;

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::thread;

#[cfg(feature = "timing")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "timing")]
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::node::{Data, Node, NodeRef, ReadGuard, WriteGuard};
use crate::tracing_helpers::{debug_log, trace_log};

/// A B+ tree that can be read and written from many threads at once.
///
/// Each node is protected by its own reader/writer lock, and one more
/// tree-wide lock guards the root slot. The tree-wide lock is only held
/// exclusively while the very first leaf is installed or while a full root
/// is split; all other work happens under node locks.
///
/// Cloning a [`ConcurrentBTree`] is cheap and yields another handle to the
/// same tree, so the usual way to share it is to clone it into each thread.
/// It is also `Sync`, so it can be shared by reference as well.
///
/// The `CAPACITY` const generic is the maximum number of keys in a node,
/// and must be at least 2. Larger nodes make the tree shallower but make
/// every insertion shift more entries while holding a leaf lock.
///
/// # Examples
///
/// ```
/// let tree = concurrent_btree::ConcurrentBTree::<u64, u64>::default();
///
/// // insert returns the last value, if it was set, similarly to a BTreeMap
/// assert_eq!(tree.insert(1, 10), None);
/// assert_eq!(tree.insert(1, 11), Some(10));
///
/// // get returns a clone of the value, so that no lock needs to be held
/// // after the call returns.
/// assert_eq!(tree.get(&1), Some(11));
/// assert_eq!(tree.get(&2), None);
/// ```
#[derive(Clone)]
pub struct ConcurrentBTree<K, V, const CAPACITY: usize = 64>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    inner: Arc<Inner<K, V, CAPACITY>>,
}

impl<K, V, const CAPACITY: usize> fmt::Debug for ConcurrentBTree<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentBTree")
            .field("capacity", &CAPACITY)
            .finish_non_exhaustive()
    }
}

impl<K, V, const CAPACITY: usize> Default for ConcurrentBTree<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    fn default() -> ConcurrentBTree<K, V, CAPACITY> {
        assert!(
            CAPACITY >= 2,
            "ConcurrentBTree CAPACITY must be at least 2"
        );

        let inner = Arc::new(Inner {
            root: RwLock::new(None),
            #[cfg(feature = "timing")]
            slowest_op: u64::MIN.into(),
            #[cfg(feature = "timing")]
            fastest_op: u64::MAX.into(),
        });

        ConcurrentBTree { inner }
    }
}

struct Inner<K, V, const CAPACITY: usize>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    // the tree-wide lock. the root is only read or
    // replaced through it, and it is always taken
    // before the root node's own lock.
    root: RwLock<Option<NodeRef<K, V, CAPACITY>>>,
    #[cfg(feature = "timing")]
    slowest_op: AtomicU64,
    #[cfg(feature = "timing")]
    fastest_op: AtomicU64,
}

#[cfg(any(feature = "timing", feature = "print_utilization_on_drop"))]
impl<K, V, const CAPACITY: usize> Drop for Inner<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    fn drop(&mut self) {
        #[cfg(feature = "timing")]
        self.print_timing();

        #[cfg(feature = "print_utilization_on_drop")]
        self.print_utilization();
    }
}

impl<K, V, const CAPACITY: usize> ConcurrentBTree<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    /// Creates an empty tree.
    ///
    /// # Panics
    ///
    /// Panics if `CAPACITY` is below 2, because such nodes cannot be split.
    pub fn new() -> ConcurrentBTree<K, V, CAPACITY> {
        ConcurrentBTree::default()
    }

    /// Get a clone of the value associated with this key, if any.
    ///
    /// Absence is a normal outcome and is reported as `None`.
    ///
    /// # Examples
    /// ```
    /// let tree = concurrent_btree::ConcurrentBTree::<u64, u64>::default();
    ///
    /// tree.insert(1, 1);
    ///
    /// let actual = tree.get(&0);
    /// let expected = None;
    /// assert_eq!(expected, actual);
    ///
    /// let actual = tree.get(&1);
    /// let expected = Some(1);
    /// assert_eq!(expected, actual);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        #[cfg(feature = "timing")]
        let before = Instant::now();

        let ret = self.inner.get(key);

        #[cfg(feature = "timing")]
        self.inner.record_timing(before.elapsed());

        ret
    }

    /// Insert a key-value pair, overwriting the value in place if the key is
    /// already present. Returns the previous value associated with this key
    /// if one existed.
    ///
    /// When several threads insert the same key concurrently, the writes are
    /// serialized by the leaf's lock and the last one wins.
    ///
    /// # Examples
    ///
    /// ```
    /// let tree = concurrent_btree::ConcurrentBTree::<u64, u64>::default();
    ///
    /// assert_eq!(tree.insert(1, 1), None);
    /// assert_eq!(tree.insert(1, 2), Some(1));
    /// assert_eq!(tree.get(&1), Some(2));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        #[cfg(feature = "timing")]
        let before = Instant::now();

        let ret = self.inner.insert(key, value);

        #[cfg(feature = "timing")]
        self.inner.record_timing(before.elapsed());

        ret
    }
}

impl<K, V, const CAPACITY: usize> Inner<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // the root is latched before the tree-wide lock is released,
        // otherwise a concurrent root split could move our key into a
        // sibling that we would never visit.
        let root = self.root.read();
        let mut cursor: ReadGuard<K, V, CAPACITY> = root.as_ref()?.read_arc();
        drop(root);

        loop {
            let child = match cursor.data {
                Data::Leaf(ref leaf) => return leaf.get(key).cloned(),
                Data::Index(ref index) => Arc::clone(index.child_for(key).1),
            };

            let child_guard = child.read_arc();

            if debug_delay() {
                thread::yield_now();
            }

            // releases the parent, now that the child is held
            cursor = child_guard;
        }
    }

    fn insert(&self, key: K, value: V) -> Option<V> {
        let mut root_slot = self.root.write();

        let Some(root) = root_slot.clone() else {
            *root_slot = Some(Arc::new(RwLock::new(Node::new_leaf(key, value))));
            debug_log!("installed first leaf as root");
            return None;
        };

        let mut root_guard: WriteGuard<K, V, CAPACITY> = root.write_arc();

        let mut cursor = if root_guard.is_full() {
            let (separator, rhs) = root_guard.split();
            let level = root_guard.level + 1;

            // the sibling must be latched before the new root publishes it
            let rhs = Arc::new(RwLock::new(rhs));
            let rhs_guard = rhs.write_arc();

            let go_right = separator <= key;

            let new_root = Node::new_root(level, root, separator, rhs);
            *root_slot = Some(Arc::new(RwLock::new(new_root)));
            drop(root_slot);

            debug_log!(height = level + 1, "split root");

            if go_right {
                drop(root_guard);
                rhs_guard
            } else {
                drop(rhs_guard);
                root_guard
            }
        } else {
            drop(root_slot);
            root_guard
        };

        loop {
            let index = match cursor.data {
                Data::Leaf(ref mut leaf) => return leaf.insert(key, value),
                Data::Index(ref mut index) => index,
            };

            let (position, child) = index.child_for(&key);
            let child = Arc::clone(child);
            let mut child_guard = child.write_arc();

            if child_guard.is_full() {
                // split one level ahead of the cursor, while the parent is
                // still write-locked and guaranteed to have room.
                let (separator, rhs) = child_guard.split();
                trace_log!(node_level = child_guard.level, "split child");

                let rhs = Arc::new(RwLock::new(rhs));
                if separator <= key {
                    // nobody else can reach rhs until the parent is released
                    child_guard = rhs.write_arc();
                }

                index.insert_split(position, separator, rhs);
            }

            if debug_delay() {
                thread::yield_now();
            }

            // releases the parent, now that the child is held
            cursor = child_guard;
        }
    }

    #[cfg(feature = "timing")]
    fn print_timing(&self) {
        println!(
            "min : {:?}",
            Duration::from_nanos(self.fastest_op.load(Ordering::Acquire))
        );
        println!(
            "max : {:?}",
            Duration::from_nanos(self.slowest_op.load(Ordering::Acquire))
        );
    }

    #[cfg(feature = "timing")]
    fn record_timing(&self, time: Duration) {
        let nanos = u64::try_from(time.as_nanos()).unwrap_or(u64::MAX);
        let min = self.fastest_op.load(Ordering::Relaxed);
        if nanos < min {
            self.fastest_op.fetch_min(nanos, Ordering::Relaxed);
        }

        let max = self.slowest_op.load(Ordering::Relaxed);
        if nanos > max {
            self.slowest_op.fetch_max(nanos, Ordering::Relaxed);
        }
    }

    // walks the tree one level at a time. only called from drop, when no
    // other handle can be holding any lock.
    #[cfg(feature = "print_utilization_on_drop")]
    fn print_utilization(&mut self) {
        let Some(root) = self.root.get_mut().clone() else {
            println!("empty tree");
            return;
        };

        let mut layer: Vec<NodeRef<K, V, CAPACITY>> = vec![root];

        while !layer.is_empty() {
            let mut next_layer = vec![];
            let mut level = 0;

            let mut min_fill: f64 = 1.0;
            let mut max_fill: f64 = 0.0;
            let mut fill_sum: f64 = 0.0;

            for node_ref in &layer {
                let node = node_ref.read();
                level = node.level;

                let fill = node.len() as f64 / CAPACITY as f64;
                min_fill = min_fill.min(fill);
                max_fill = max_fill.max(fill);
                fill_sum += fill;

                if let Data::Index(ref index) = node.data {
                    next_layer.extend(index.children().iter().cloned());
                }
            }

            println!("level {level} count {}", layer.len());
            println!(
                "logical: min: {min_fill} max: {max_fill} avg: {}",
                fill_sum / layer.len() as f64
            );

            layer = next_layer;
        }
    }
}

impl<K, V, const CAPACITY: usize> FromIterator<(K, V)> for ConcurrentBTree<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let tree = ConcurrentBTree::default();

        for (k, v) in iter {
            tree.insert(k, v);
        }

        tree
    }
}

impl<K, V, const CAPACITY: usize> Extend<(K, V)> for ConcurrentBTree<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

const fn _test_impls() {
    const fn send<T: Send>() {}
    const fn sync<T: Sync>() {}
    const fn clone<T: Clone>() {}
    send::<ConcurrentBTree<usize, usize>>();
    sync::<ConcurrentBTree<usize, usize>>();
    clone::<ConcurrentBTree<usize, usize>>();
}
