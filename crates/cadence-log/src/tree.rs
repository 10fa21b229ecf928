//! Persistent AVL tree
//!
//! Every insertion returns a new tree. Nodes on the path from the root to
//! the insertion point are copied; every other subtree is shared with the
//! previous version through `Arc`, so old versions stay valid and cheap.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type Link<K, V> = Option<Arc<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    height: u32,
    size: usize,
    left: Link<K, V>,
    right: Link<K, V>,
}

#[inline]
fn height<K, V>(link: &Link<K, V>) -> u32 {
    link.as_ref().map_or(0, |n| n.height)
}

#[inline]
fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

fn make<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
    Arc::new(Node {
        height: 1 + height(&left).max(height(&right)),
        size: 1 + size(&left) + size(&right),
        key,
        value,
        left,
        right,
    })
}

/// Rebuild a node whose children differ in height by at most two
fn balance<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<Node<K, V>> {
    let hl = height(&left);
    let hr = height(&right);

    if hl > hr + 1 {
        if let Some(l) = &left {
            if height(&l.left) >= height(&l.right) {
                // Single right rotation
                let new_right = make(key, value, l.right.clone(), right);
                return make(l.key.clone(), l.value.clone(), l.left.clone(), Some(new_right));
            }
            if let Some(lr) = &l.right {
                // Left-right rotation
                let new_left = make(l.key.clone(), l.value.clone(), l.left.clone(), lr.left.clone());
                let new_right = make(key, value, lr.right.clone(), right);
                return make(lr.key.clone(), lr.value.clone(), Some(new_left), Some(new_right));
            }
        }
    } else if hr > hl + 1 {
        if let Some(r) = &right {
            if height(&r.right) >= height(&r.left) {
                // Single left rotation
                let new_left = make(key, value, left, r.left.clone());
                return make(r.key.clone(), r.value.clone(), Some(new_left), r.right.clone());
            }
            if let Some(rl) = &r.left {
                // Right-left rotation
                let new_left = make(key, value, left, rl.left.clone());
                let new_right = make(r.key.clone(), r.value.clone(), rl.right.clone(), r.right.clone());
                return make(rl.key.clone(), rl.value.clone(), Some(new_left), Some(new_right));
            }
        }
    }

    make(key, value, left, right)
}

fn insert_at<K: Ord + Clone, V: Clone>(link: &Link<K, V>, key: K, value: V) -> Arc<Node<K, V>> {
    match link {
        None => make(key, value, None, None),
        Some(node) => match key.cmp(&node.key) {
            Ordering::Less => {
                let left = insert_at(&node.left, key, value);
                balance(node.key.clone(), node.value.clone(), Some(left), node.right.clone())
            }
            Ordering::Greater => {
                let right = insert_at(&node.right, key, value);
                balance(node.key.clone(), node.value.clone(), node.left.clone(), Some(right))
            }
            Ordering::Equal => make(key, value, node.left.clone(), node.right.clone()),
        },
    }
}

/// Immutable ordered map with structural sharing
pub struct PersistentTree<K, V> {
    root: Link<K, V>,
}

impl<K, V> PersistentTree<K, V> {
    pub fn new() -> Self {
        PersistentTree { root: None }
    }

    #[inline]
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Height of the tree (0 when empty)
    #[inline]
    pub fn height(&self) -> u32 {
        height(&self.root)
    }

    /// Entries in increasing key order
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter { stack: Vec::new() };
        iter.descend_left(self.root.as_deref());
        iter
    }

    /// Do both trees share the same root node?
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<K: Ord, V> PersistentTree<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Greatest entry
    pub fn last(&self) -> Option<(&K, &V)> {
        let mut current = self.root.as_deref()?;
        while let Some(right) = current.right.as_deref() {
            current = right;
        }
        Some((&current.key, &current.value))
    }
}

impl<K: Ord + Clone, V: Clone> PersistentTree<K, V> {
    /// New version with `key` mapped to `value`; `self` is left untouched
    pub fn insert(&self, key: K, value: V) -> Self {
        PersistentTree {
            root: Some(insert_at(&self.root, key, value)),
        }
    }
}

impl<K, V> Clone for PersistentTree<K, V> {
    fn clone(&self) -> Self {
        PersistentTree {
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for PersistentTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// In-order iterator
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn descend_left(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.descend_left(node.right.as_deref());
        Some((&node.key, &node.value))
    }
}
