use super::node::{InnerNode, LeafNode, Node};
use crate::range::KeyRange;

/// In-order cursor over the leaves of a tree, optionally positioned at a
/// lower bound.
pub struct Iter<'a, K, V> {
    // inner nodes on the current path, with the next child to visit
    stack: Vec<(&'a InnerNode<K, V>, usize)>,
    leaf: Option<&'a LeafNode<K, V>>,
    pos: usize,
}

impl<'a, K: Ord + Clone, V> Iter<'a, K, V> {
    pub(super) fn new(root: &'a Node<K, V>) -> Self {
        Self::seek(root, None)
    }

    /// Positions the cursor at the first key `>= low`.
    pub(super) fn seek(root: &'a Node<K, V>, low: Option<&K>) -> Self {
        let mut stack = Vec::new();
        let mut node = root;
        loop {
            match node {
                Node::Inner(inner) => {
                    let idx = low.map_or(0, |key| inner.locate(key));
                    stack.push((inner, idx + 1));
                    node = &inner.children[idx];
                }
                Node::Leaf(leaf) => {
                    return Self {
                        stack,
                        leaf: Some(leaf),
                        pos: low.map_or(0, |key| leaf.locate(key)),
                    };
                }
            }
        }
    }

    fn descend_leftmost(&mut self, mut node: &'a Node<K, V>) {
        loop {
            match node {
                Node::Inner(inner) => {
                    self.stack.push((inner, 1));
                    node = &inner.children[0];
                }
                Node::Leaf(leaf) => {
                    self.leaf = Some(leaf);
                    self.pos = 0;
                    return;
                }
            }
        }
    }
}

impl<'a, K: Ord + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(leaf) = self.leaf {
                if self.pos < leaf.keys.len() {
                    let idx = self.pos;
                    self.pos += 1;
                    return Some((&leaf.keys[idx], &leaf.values[idx]));
                }
                self.leaf = None;
            }

            let child = {
                let (inner, idx) = self.stack.last_mut()?;
                let inner: &'a InnerNode<K, V> = *inner;
                match inner.children.get(*idx) {
                    Some(child) => {
                        *idx += 1;
                        child
                    }
                    None => {
                        self.stack.pop();
                        continue;
                    }
                }
            };
            self.descend_leftmost(child);
        }
    }
}

/// Entries whose keys fall in any of a sorted, non-overlapping list of
/// closed ranges, in key order.
pub struct RangeIter<'a, K, V> {
    root: &'a Node<K, V>,
    ranges: std::slice::Iter<'a, KeyRange<K>>,
    current: Option<(Iter<'a, K, V>, &'a K)>,
}

impl<'a, K: Ord + Clone, V> RangeIter<'a, K, V> {
    pub(super) fn new(root: &'a Node<K, V>, ranges: &'a [KeyRange<K>]) -> Self {
        Self {
            root,
            ranges: ranges.iter(),
            current: None,
        }
    }
}

impl<'a, K: Ord + Clone, V> Iterator for RangeIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((iter, high)) = self.current.as_mut() {
                if let Some((key, value)) = iter.next() {
                    if key <= *high {
                        return Some((key, value));
                    }
                }
            }

            let range = self.ranges.next()?;
            self.current = Some((Iter::seek(self.root, Some(&range.low)), &range.high));
        }
    }
}
