//! Tree nodes and the single-entry insertion path.

/// A tree node. Leaves hold entries, inner nodes hold separators and
/// exclusively own their children.
#[derive(Debug, Clone)]
pub enum Node<K, V> {
    Leaf(LeafNode<K, V>),
    Inner(InnerNode<K, V>),
}

#[derive(Debug, Clone)]
pub struct LeafNode<K, V> {
    pub(crate) keys: Vec<K>,
    pub(crate) values: Vec<V>,
}

/// `children[i]` holds keys below `keys[i]`; `children[i + 1]` holds keys at
/// or above it.
#[derive(Debug, Clone)]
pub struct InnerNode<K, V> {
    pub(crate) keys: Vec<K>,
    pub(crate) children: Vec<Node<K, V>>,
}

/// Result of a node split, handed to the parent.
#[derive(Debug)]
pub struct Split<K, V> {
    pub key: K,
    pub right: Node<K, V>,
}

impl<K, V> LeafNode<K, V> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<K: Ord, V> LeafNode<K, V> {
    /// First index whose key is `>= key`.
    pub fn locate(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k < key)
    }

    /// Inserts a key that is not present yet, splitting first if the leaf
    /// already holds `capacity` keys.
    fn insert(&mut self, key: K, value: V, capacity: usize) -> Option<Split<K, V>>
    where
        K: Clone,
    {
        let idx = self.locate(&key);
        self.keys.insert(idx, key);
        self.values.insert(idx, value);
        if self.keys.len() <= capacity {
            return None;
        }

        // The left half keeps `mid` keys, plus the new one when it landed
        // there. Clamped so a single-key leaf still splits into two.
        let mid = (capacity + 1) / 2;
        let at = (mid + usize::from(idx < mid)).min(self.keys.len() - 1);
        let right = LeafNode {
            keys: self.keys.split_off(at),
            values: self.values.split_off(at),
        };

        Some(Split {
            key: right.keys[0].clone(),
            right: Node::Leaf(right),
        })
    }
}

impl<K: Ord + Clone, V> InnerNode<K, V> {
    /// First index whose separator is `> key`, i.e. the child to descend into.
    pub fn locate(&self, key: &K) -> usize {
        self.keys.partition_point(|k| k <= key)
    }

    /// A full inner node splits before descending. The middle separator moves
    /// up and the entry goes to whichever half now covers it.
    fn insert(
        &mut self,
        key: K,
        value: V,
        leaf_capacity: usize,
        inner_capacity: usize,
    ) -> Option<Split<K, V>> {
        if self.keys.len() < inner_capacity {
            self.insert_non_full(key, value, leaf_capacity, inner_capacity);
            return None;
        }

        let mid = (inner_capacity + 1) / 2;
        // keys[mid - 1] is promoted and stays in neither half
        let mut upper = self.keys.split_off(mid - 1);
        let separator = upper.remove(0);
        let mut right = InnerNode {
            keys: upper,
            children: self.children.split_off(mid),
        };

        if key < separator {
            self.insert_non_full(key, value, leaf_capacity, inner_capacity);
        } else {
            right.insert_non_full(key, value, leaf_capacity, inner_capacity);
        }

        Some(Split {
            key: separator,
            right: Node::Inner(right),
        })
    }

    fn insert_non_full(&mut self, key: K, value: V, leaf_capacity: usize, inner_capacity: usize) {
        let idx = self.locate(&key);
        if let Some(split) = self.children[idx].insert(key, value, leaf_capacity, inner_capacity) {
            self.keys.insert(idx, split.key);
            self.children.insert(idx + 1, split.right);
        }
    }
}

impl<K: Ord + Clone, V> Node<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut node = self;
        loop {
            match node {
                Node::Inner(inner) => node = &inner.children[inner.locate(key)],
                Node::Leaf(leaf) => {
                    let idx = leaf.locate(key);
                    return match leaf.keys.get(idx) {
                        Some(found) if found == key => leaf.values.get(idx),
                        _ => None,
                    };
                }
            }
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self {
            Node::Inner(inner) => {
                let idx = inner.locate(key);
                inner.children[idx].get_mut(key)
            }
            Node::Leaf(leaf) => {
                let idx = leaf.locate(key);
                match leaf.keys.get(idx) {
                    Some(found) if found == key => leaf.values.get_mut(idx),
                    _ => None,
                }
            }
        }
    }

    /// Inserts a key that is not present in this subtree.
    pub fn insert(
        &mut self,
        key: K,
        value: V,
        leaf_capacity: usize,
        inner_capacity: usize,
    ) -> Option<Split<K, V>> {
        match self {
            Node::Leaf(leaf) => leaf.insert(key, value, leaf_capacity),
            Node::Inner(inner) => inner.insert(key, value, leaf_capacity, inner_capacity),
        }
    }
}
