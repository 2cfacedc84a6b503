//! Bottom-up construction of a tree from a sorted batch.

use super::node::{InnerNode, LeafNode, Node};
use itertools::Itertools as _;

/// Builds a tree from entries sorted by key. Runs of equal keys collapse to
/// their last entry. Returns the root and the number of distinct keys.
///
/// Leaves are filled to `leaf_capacity`; each inner level groups up to
/// `inner_capacity + 1` children, using the smallest key of every child but
/// the first as separators.
pub(super) fn build<K, V>(
    entries: Vec<(K, V)>,
    leaf_capacity: usize,
    inner_capacity: usize,
) -> (Node<K, V>, usize)
where
    K: Ord + Clone,
{
    let mut entries = entries
        .into_iter()
        .coalesce(|prev, next| if prev.0 == next.0 { Ok(next) } else { Err((prev, next)) })
        .peekable();

    let mut level: Vec<(K, Node<K, V>)> = Vec::new();
    let mut len = 0;
    while entries.peek().is_some() {
        let (keys, values): (Vec<K>, Vec<V>) = entries.by_ref().take(leaf_capacity).unzip();
        len += keys.len();
        level.push((keys[0].clone(), Node::Leaf(LeafNode { keys, values })));
    }

    if level.is_empty() {
        return (Node::Leaf(LeafNode::new()), 0);
    }

    let fanout = inner_capacity + 1;
    while level.len() > 1 {
        let mut groups: Vec<Vec<(K, Node<K, V>)>> = Vec::new();
        let mut nodes = level.into_iter().peekable();
        while nodes.peek().is_some() {
            groups.push(nodes.by_ref().take(fanout).collect());
        }

        // an inner node needs two children; borrow one from the neighbour
        let count = groups.len();
        if count > 1 && groups[count - 1].len() == 1 {
            if let Some(moved) = groups[count - 2].pop() {
                groups[count - 1].insert(0, moved);
            }
        }

        level = groups
            .into_iter()
            .map(|group| {
                let (mut keys, children): (Vec<K>, Vec<Node<K, V>>) = group.into_iter().unzip();
                let min = keys.remove(0);
                (min, Node::Inner(InnerNode { keys, children }))
            })
            .collect();
    }

    let root = level.pop().map(|(_, node)| node).unwrap_or_else(|| Node::Leaf(LeafNode::new()));
    (root, len)
}
