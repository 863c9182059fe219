use std::borrow::Borrow;
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};
use stack_map::StackMap;

/// Owning handle to a node. Each node sits in exactly one parent slot (or in
/// the tree's root slot); clones of the handle are only taken to latch it.
pub(crate) type NodeRef<K, V, const CAPACITY: usize> = Arc<RwLock<Node<K, V, CAPACITY>>>;

pub(crate) type ReadGuard<K, V, const CAPACITY: usize> =
    ArcRwLockReadGuard<RawRwLock, Node<K, V, CAPACITY>>;

pub(crate) type WriteGuard<K, V, const CAPACITY: usize> =
    ArcRwLockWriteGuard<RawRwLock, Node<K, V, CAPACITY>>;

pub(crate) enum Data<K, V, const CAPACITY: usize>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    Leaf(StackMap<K, V, CAPACITY>),
    Index(Index<K, V, CAPACITY>),
}

pub(crate) struct Node<K, V, const CAPACITY: usize>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    // 0 for leaves, otherwise one more than the level of every child
    pub(crate) level: usize,
    pub(crate) data: Data<K, V, CAPACITY>,
}

impl<K, V, const CAPACITY: usize> Node<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    /// The leaf installed when the tree goes from empty to non-empty.
    pub(crate) fn new_leaf(key: K, value: V) -> Node<K, V, CAPACITY> {
        let mut leaf = StackMap::default();
        leaf.insert(key, value);

        Node {
            level: 0,
            data: Data::Leaf(leaf),
        }
    }

    /// A root sitting on top of the two halves of a split.
    pub(crate) fn new_root(
        level: usize,
        lhs: NodeRef<K, V, CAPACITY>,
        separator: K,
        rhs: NodeRef<K, V, CAPACITY>,
    ) -> Node<K, V, CAPACITY> {
        assert!(level > 0);

        let mut keys = Vec::with_capacity(CAPACITY);
        keys.push(separator);

        let mut children = Vec::with_capacity(CAPACITY + 1);
        children.push(lhs);
        children.push(rhs);

        Node {
            level,
            data: Data::Index(Index { keys, children }),
        }
    }

    /// Number of keys held: entries for a leaf, separators for an index.
    pub(crate) fn len(&self) -> usize {
        match self.data {
            Data::Leaf(ref leaf) => leaf.len(),
            Data::Index(ref index) => index.keys.len(),
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() >= CAPACITY
    }

    /// Moves the upper half of this node into a new right sibling at the same
    /// level, returning the separator that routes between the two halves.
    ///
    /// Keys strictly below the separator stay here, the rest (including the
    /// separator itself, for leaves) live in the sibling. For any capacity of
    /// at least 2, both halves end up below capacity.
    pub(crate) fn split(&mut self) -> (K, Node<K, V, CAPACITY>) {
        assert!(
            self.len() >= 2,
            "split requires at least 2 keys, node has {}",
            self.len()
        );

        let (separator, rhs_data) = match self.data {
            Data::Leaf(ref mut leaf) => {
                // the lower half keeps the middle entry when the count is odd
                let split_idx = (leaf.len() + 1) / 2;
                let rhs_leaf = leaf.split_off(split_idx);

                // the separator is a copy of the least key moved right
                let Some((separator, _)) = rhs_leaf.iter().next() else {
                    unreachable!("split_off at {split_idx} left the right leaf empty");
                };
                (separator.clone(), Data::Leaf(rhs_leaf))
            }
            Data::Index(ref mut index) => {
                let (separator, rhs_index) = index.split();
                (separator, Data::Index(rhs_index))
            }
        };

        let rhs = Node {
            level: self.level,
            data: rhs_data,
        };

        assert!(!self.is_full());
        assert!(!rhs.is_full());

        (separator, rhs)
    }
}

/// Separator keys and the children they partition. Child `i` holds
/// the keys `k` with `keys[i - 1] <= k < keys[i]`, so there is always
/// exactly one more child than there are keys.
pub(crate) struct Index<K, V, const CAPACITY: usize>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    keys: Vec<K>,
    children: Vec<NodeRef<K, V, CAPACITY>>,
}

impl<K, V, const CAPACITY: usize> Index<K, V, CAPACITY>
where
    K: 'static + Clone + Ord + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    /// Binary search for the child responsible for `key`: the one to the left
    /// of the first separator greater than `key`, or the last child when no
    /// separator is.
    pub(crate) fn child_for<Q>(&self, key: &Q) -> (usize, &NodeRef<K, V, CAPACITY>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = self
            .keys
            .partition_point(|separator| separator.borrow() <= key);

        (position, &self.children[position])
    }

    /// Absorbs the result of splitting the child at `position`: that child
    /// keeps the keys below `separator`, and `rhs` is placed directly to its
    /// right.
    pub(crate) fn insert_split(
        &mut self,
        position: usize,
        separator: K,
        rhs: NodeRef<K, V, CAPACITY>,
    ) {
        assert!(self.keys.len() < CAPACITY, "parent must never be full");
        debug_assert!(position == 0 || self.keys[position - 1] < separator);
        debug_assert!(position == self.keys.len() || separator < self.keys[position]);

        self.keys.insert(position, separator);
        self.children.insert(position + 1, rhs);
    }

    #[cfg(any(test, feature = "print_utilization_on_drop"))]
    pub(crate) fn children(&self) -> &[NodeRef<K, V, CAPACITY>] {
        &self.children
    }

    #[cfg(test)]
    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    // the middle separator is promoted and kept by neither half
    fn split(&mut self) -> (K, Index<K, V, CAPACITY>) {
        let mid = self.keys.len() / 2;

        let mut rhs_keys = Vec::with_capacity(CAPACITY);
        rhs_keys.extend(self.keys.drain(mid + 1..));
        let separator = self.keys.remove(mid);

        let mut rhs_children = Vec::with_capacity(CAPACITY + 1);
        rhs_children.extend(self.children.drain(mid + 1..));

        assert_eq!(self.children.len(), self.keys.len() + 1);
        assert_eq!(rhs_children.len(), rhs_keys.len() + 1);

        (
            separator,
            Index {
                keys: rhs_keys,
                children: rhs_children,
            },
        )
    }
}
