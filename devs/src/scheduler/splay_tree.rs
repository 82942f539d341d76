use std::cmp::Ordering;

use crate::scheduler::{Entry, Scheduler};
use crate::{Time, Timed};

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    left: Option<usize>,
    right: Option<usize>,
}

/// Self-adjusting binary search tree using top-down splaying.
///
/// Nodes live in an arena and refer to each other by index. Values are ordered by their [`Ord`]
/// implementation, which must be consistent with their time: [`Entry`] orders by time and breaks
/// ties by child index, which is what allows removing one exact entry among many scheduled at the
/// same time.
#[derive(Debug, Clone)]
pub struct SplayTree<T> {
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
}

impl<T> Default for SplayTree<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }
}

impl<T: Ord + Clone> SplayTree<T> {
    /// Number of values in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value.
    pub fn insert(&mut self, value: T) {
        let node = self.alloc(value.clone());
        if let Some(root) = self.root {
            let root = self.splay(root, &value);
            if value < self.nodes[root].value {
                self.nodes[node].left = self.nodes[root].left.take();
                self.nodes[node].right = Some(root);
            } else {
                self.nodes[node].right = self.nodes[root].right.take();
                self.nodes[node].left = Some(root);
            }
        }
        self.root = Some(node);
        self.len += 1;
    }

    /// Removes a value equal to `value` and returns it, if present.
    pub fn delete(&mut self, value: &T) -> Option<T> {
        let root = self.splay(self.root?, value);
        if self.nodes[root].value != *value {
            self.root = Some(root);
            return None;
        }
        self.root = match self.nodes[root].left.take() {
            None => self.nodes[root].right.take(),
            Some(left) => {
                let right = self.nodes[root].right.take();
                let new_root = self.splay(left, value);
                // Without duplicates the new root has no right child; with them, hang the right
                // subtree off the rightmost node.
                let mut tail = new_root;
                while let Some(next) = self.nodes[tail].right {
                    tail = next;
                }
                self.nodes[tail].right = right;
                Some(new_root)
            }
        };
        self.len -= 1;
        self.free.push(root);
        Some(self.nodes[root].value.clone())
    }

    /// Returns the minimum value, splaying it to the root.
    pub fn peek(&mut self) -> Option<&T> {
        let min = self.min_value()?;
        let root = self.splay(self.root?, &min);
        self.root = Some(root);
        Some(&self.nodes[root].value)
    }

    /// Removes and returns the minimum value.
    pub fn pop(&mut self) -> Option<T> {
        let min = self.min_value()?;
        self.delete(&min)
    }

    /// Checks if a value equal to `value` is in the tree.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        let mut current = self.root;
        while let Some(index) = current {
            let node = &self.nodes[index];
            current = match value.cmp(&node.value) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return true,
            };
        }
        false
    }

    fn min_value(&self) -> Option<T> {
        let mut index = self.root?;
        while let Some(left) = self.nodes[index].left {
            index = left;
        }
        Some(self.nodes[index].value.clone())
    }

    fn alloc(&mut self, value: T) -> usize {
        let node = Node {
            value,
            left: None,
            right: None,
        };
        if let Some(index) = self.free.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Top-down splay of the subtree rooted at `root`; returns the new subtree root, which holds
    /// `key` if present, or its in-order neighbor otherwise.
    fn splay(&mut self, root: usize, key: &T) -> usize {
        let mut t = root;
        // Roots and innermost nodes of the trees assembled on the left (smaller) and right
        // (greater) sides.
        let mut left_root = None;
        let mut right_root = None;
        let mut left_tail: Option<usize> = None;
        let mut right_tail: Option<usize> = None;
        loop {
            match key.cmp(&self.nodes[t].value) {
                Ordering::Less => {
                    let Some(mut next) = self.nodes[t].left else {
                        break;
                    };
                    if *key < self.nodes[next].value {
                        // rotate right
                        self.nodes[t].left = self.nodes[next].right;
                        self.nodes[next].right = Some(t);
                        t = next;
                        match self.nodes[t].left {
                            Some(left) => next = left,
                            None => break,
                        }
                    }
                    // link right
                    match right_tail {
                        Some(tail) => self.nodes[tail].left = Some(t),
                        None => right_root = Some(t),
                    }
                    right_tail = Some(t);
                    t = next;
                }
                Ordering::Greater => {
                    let Some(mut next) = self.nodes[t].right else {
                        break;
                    };
                    if *key > self.nodes[next].value {
                        // rotate left
                        self.nodes[t].right = self.nodes[next].left;
                        self.nodes[next].left = Some(t);
                        t = next;
                        match self.nodes[t].right {
                            Some(right) => next = right,
                            None => break,
                        }
                    }
                    // link left
                    match left_tail {
                        Some(tail) => self.nodes[tail].right = Some(t),
                        None => left_root = Some(t),
                    }
                    left_tail = Some(t);
                    t = next;
                }
                Ordering::Equal => break,
            }
        }
        // assemble
        match left_tail {
            Some(tail) => self.nodes[tail].right = self.nodes[t].left,
            None => left_root = self.nodes[t].left,
        }
        match right_tail {
            Some(tail) => self.nodes[tail].left = self.nodes[t].right,
            None => right_root = self.nodes[t].right,
        }
        self.nodes[t].left = left_root;
        self.nodes[t].right = right_root;
        t
    }
}

/// Scheduler backed by a [`SplayTree`]: amortized logarithmic time for every operation.
#[derive(Debug, Default, Clone)]
pub struct SplayTreeScheduler {
    tree: SplayTree<Entry>,
}

impl Scheduler for SplayTreeScheduler {
    fn schedule(&mut self, entry: Entry) {
        self.tree.insert(entry);
    }

    fn unschedule(&mut self, entry: Entry) -> Option<Entry> {
        self.tree.delete(&entry)
    }

    fn read(&mut self) -> Option<Time> {
        self.tree.peek().map(Timed::time_next)
    }

    fn imminent(&mut self, time: Time) -> Vec<Entry> {
        let mut imminent = Vec::new();
        while self.read() == Some(time) {
            imminent.extend(self.tree.pop());
        }
        imminent
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inserts_and_pops_in_order() {
        let mut tree = SplayTree::default();
        for value in [5, 3, 8, 1, 4, 7, 9, 2, 6, 0] {
            tree.insert(value);
        }
        assert_eq!(tree.len(), 10);
        assert_eq!(tree.peek(), Some(&0));
        let popped: Vec<_> = std::iter::from_fn(|| tree.pop()).collect();
        assert_eq!(popped, (0..10).collect::<Vec<_>>());
        assert!(tree.is_empty());
        assert_eq!(tree.pop(), None);
    }

    #[test]
    fn test_delete_exact_among_equal_times() {
        let mut tree = SplayTree::default();
        for id in 0..5 {
            tree.insert(Entry::new(1.0, id));
        }
        assert_eq!(tree.delete(&Entry::new(1.0, 3)), Some(Entry::new(1.0, 3)));
        assert_eq!(tree.delete(&Entry::new(1.0, 3)), None);
        assert!(!tree.contains(&Entry::new(1.0, 3)));
        assert!(tree.contains(&Entry::new(1.0, 4)));
        let ids: Vec<_> = std::iter::from_fn(|| tree.pop()).map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_node_reuse() {
        let mut tree = SplayTree::default();
        tree.insert(1);
        tree.insert(2);
        tree.delete(&1);
        tree.insert(3);
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.pop(), Some(2));
        assert_eq!(tree.pop(), Some(3));
    }

    proptest! {
        #[test]
        fn test_matches_sorted_vector(
            values in proptest::collection::vec(0_u32..1000, 0..200),
            removals in proptest::collection::vec(0_usize..200, 0..50),
        ) {
            let mut tree = SplayTree::default();
            let mut expected = values.clone();
            for value in &values {
                tree.insert(*value);
            }
            for index in removals {
                if index < expected.len() {
                    let value = expected.remove(index);
                    prop_assert_eq!(tree.delete(&value), Some(value));
                }
            }
            expected.sort_unstable();
            prop_assert_eq!(tree.len(), expected.len());
            let popped: Vec<_> = std::iter::from_fn(|| tree.pop()).collect();
            prop_assert_eq!(popped, expected);
        }
    }
}
