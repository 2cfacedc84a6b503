//! In-memory B+Tree backing each segment.
//!
//! Leaves hold at most `leaf_capacity` entries and inner nodes at most
//! `inner_capacity` separators. A full leaf splits before taking the new
//! entry; a full inner node splits eagerly on the way down, before the child
//! it would descend into is known to split. The root is replaced only when it
//! splits itself, so every leaf sits at the same depth.

mod bulk;
mod iter;
mod node;

pub use iter::{Iter, RangeIter};
pub use node::Node;

use crate::error::{Error, Result};
use crate::range::RangeSet;
use node::{InnerNode, LeafNode};

#[derive(Debug, Clone)]
pub struct Tree<K, V> {
    root: Node<K, V>,
    leaf_capacity: usize,
    inner_capacity: usize,
    len: usize,
}

impl<K: Ord + Clone, V> Tree<K, V> {
    pub fn new(leaf_capacity: usize, inner_capacity: usize) -> Result<Self> {
        check_capacities(leaf_capacity, inner_capacity)?;
        Ok(Self {
            root: Node::Leaf(LeafNode::new()),
            leaf_capacity,
            inner_capacity,
            len: 0,
        })
    }

    /// Builds a tree directly from a batch sorted by key, without going
    /// through [`Tree::insert`]. For equal keys the last entry wins.
    pub fn bulk_load(
        entries: Vec<(K, V)>,
        leaf_capacity: usize,
        inner_capacity: usize,
    ) -> Result<Self> {
        check_capacities(leaf_capacity, inner_capacity)?;
        if entries.windows(2).any(|pair| pair[0].0 > pair[1].0) {
            return Err(Error::InvalidOperation(
                "bulk load requires entries sorted by key".into(),
            ));
        }

        let (root, len) = bulk::build(entries, leaf_capacity, inner_capacity);
        Ok(Self {
            root,
            leaf_capacity,
            inner_capacity,
            len,
        })
    }

    /// Inserts an entry. An existing key has its value replaced in place and
    /// never causes a split.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(slot) = self.root.get_mut(&key) {
            *slot = value;
            return;
        }

        if let Some(split) = self
            .root
            .insert(key, value, self.leaf_capacity, self.inner_capacity)
        {
            let left = std::mem::replace(&mut self.root, Node::Leaf(LeafNode::new()));
            self.root = Node::Inner(InnerNode {
                keys: vec![split.key],
                children: vec![left, split.right],
            });
        }
        self.len += 1;
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.root.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    pub fn inner_capacity(&self) -> usize {
        self.inner_capacity
    }

    /// Number of levels, 1 for a tree that is a single leaf.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.root;
        while let Node::Inner(inner) = node {
            height += 1;
            node = &inner.children[0];
        }
        height
    }

    /// All entries in key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root)
    }

    /// Entries whose key falls in any range of `ranges`, in key order.
    pub fn range<'a>(&'a self, ranges: &'a RangeSet<K>) -> RangeIter<'a, K, V> {
        RangeIter::new(&self.root, ranges.as_slice())
    }
}

fn check_capacities(leaf_capacity: usize, inner_capacity: usize) -> Result<()> {
    if leaf_capacity == 0 {
        return Err(Error::Config("leaf capacity must be greater than 0".into()));
    }
    if inner_capacity <= 2 {
        return Err(Error::Config("inner capacity must be greater than 2".into()));
    }
    Ok(())
}
