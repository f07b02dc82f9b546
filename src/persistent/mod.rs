//! Immutable, structurally shared maps.
//!
//! [`PersistentMap`] is an AVL tree whose nodes are shared between
//! versions: an insert copies only the path from the root to the changed
//! node and returns a new map, leaving the old version untouched. Readers
//! holding an older version never observe a partially built node.
//! [`AtomicMap`] publishes a current version through an atomic root.

mod atomic;

pub use atomic::AtomicMap;

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type Link<K, V> = Option<Arc<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    height: u8,
    left: Link<K, V>,
    right: Link<K, V>,
}

/// An immutable AVL map with structural sharing between versions.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::PersistentMap;
///
/// let empty = PersistentMap::new();
/// let one = empty.insert(1, "one");
/// let two = one.insert(2, "two");
///
/// assert!(empty.is_empty());
/// assert_eq!(one.get(&2), None);
/// assert_eq!(two.get(&2), Some(&"two"));
/// ```
pub struct PersistentMap<K, V> {
    root: Link<K, V>,
    len: usize,
}

impl<K, V> PersistentMap<K, V> {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// In-order iteration over the entries.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.root)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Height of the tree, used by tests to check balance.
    pub fn height(&self) -> usize {
        usize::from(height(&self.root))
    }
}

impl<K: Ord, V> PersistentMap<K, V> {
    /// Looks a key up by any borrowed form of it, as `BTreeMap::get` does.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(node.key.borrow()) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            };
        }
        None
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K: Ord + Clone, V: Clone> PersistentMap<K, V> {
    /// Returns a new version with `key` mapped to `value`, replacing any
    /// existing value.
    pub fn insert(&self, key: K, value: V) -> Self {
        self.insert_with(key, value, |_, new| new)
    }

    /// Returns a new version with `key` inserted. When the key already
    /// exists, `resolver(existing, new)` decides the stored value.
    pub fn insert_with<F>(&self, key: K, value: V, resolver: F) -> Self
    where
        F: FnOnce(&V, V) -> V,
    {
        let (root, added) = insert_node(&self.root, key, value, resolver);
        Self {
            root: Some(root),
            len: self.len + usize::from(added),
        }
    }
}

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over a [`PersistentMap`].
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn new(root: &'a Link<K, V>) -> Self {
        let mut iter = Self { stack: Vec::new() };
        iter.push_left(root.as_deref());
        iter
    }

    fn push_left(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(current) = node {
            self.stack.push(current);
            node = current.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((&node.key, &node.value))
    }
}

fn height<K, V>(link: &Link<K, V>) -> u8 {
    link.as_ref().map_or(0, |node| node.height)
}

fn make<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
    let height = 1 + height(&left).max(height(&right));
    Arc::new(Node {
        key,
        value,
        height,
        left,
        right,
    })
}

fn insert_node<K, V, F>(link: &Link<K, V>, key: K, value: V, resolver: F) -> (Arc<Node<K, V>>, bool)
where
    K: Ord + Clone,
    V: Clone,
    F: FnOnce(&V, V) -> V,
{
    let Some(node) = link else {
        return (make(key, value, None, None), true);
    };

    match key.cmp(&node.key) {
        Ordering::Less => {
            let (left, added) = insert_node(&node.left, key, value, resolver);
            let balanced = balance(node.key.clone(), node.value.clone(), Some(left), node.right.clone());
            (balanced, added)
        }
        Ordering::Greater => {
            let (right, added) = insert_node(&node.right, key, value, resolver);
            let balanced = balance(node.key.clone(), node.value.clone(), node.left.clone(), Some(right));
            (balanced, added)
        }
        Ordering::Equal => {
            let merged = resolver(&node.value, value);
            let replaced = Arc::new(Node {
                key: node.key.clone(),
                value: merged,
                height: node.height,
                left: node.left.clone(),
                right: node.right.clone(),
            });
            (replaced, false)
        }
    }
}

/// Rebuilds a node from its parts, rotating when the subtrees differ in
/// height by more than one.
fn balance<K: Clone, V: Clone>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
    let (left_height, right_height) = (height(&left), height(&right));

    if left_height > right_height + 1 {
        if let Some(l) = &left {
            if height(&l.left) >= height(&l.right) {
                return make(
                    l.key.clone(),
                    l.value.clone(),
                    l.left.clone(),
                    Some(make(key, value, l.right.clone(), right)),
                );
            }
            if let Some(lr) = &l.right {
                return make(
                    lr.key.clone(),
                    lr.value.clone(),
                    Some(make(l.key.clone(), l.value.clone(), l.left.clone(), lr.left.clone())),
                    Some(make(key, value, lr.right.clone(), right)),
                );
            }
        }
    } else if right_height > left_height + 1 {
        if let Some(r) = &right {
            if height(&r.right) >= height(&r.left) {
                return make(
                    r.key.clone(),
                    r.value.clone(),
                    Some(make(key, value, left, r.left.clone())),
                    r.right.clone(),
                );
            }
            if let Some(rl) = &r.left {
                return make(
                    rl.key.clone(),
                    rl.value.clone(),
                    Some(make(key, value, left, rl.left.clone())),
                    Some(make(r.key.clone(), r.value.clone(), rl.right.clone(), r.right.clone())),
                );
            }
        }
    }

    make(key, value, left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_inserts_stay_balanced() {
        let mut map = PersistentMap::new();
        for i in 0..1024 {
            map = map.insert(i, i * 2);
        }

        assert_eq!(map.len(), 1024);
        assert!(map.height() <= 11, "height {} too large", map.height());
        assert_eq!(map.get(&512), Some(&1024));
    }

    #[test]
    fn old_versions_are_untouched() {
        let v1 = PersistentMap::new().insert("a", 1).insert("b", 2);
        let v2 = v1.insert("a", 10);

        assert_eq!(v1.get(&"a"), Some(&1));
        assert_eq!(v2.get(&"a"), Some(&10));
        assert_eq!(v2.len(), 2);
    }

    #[test]
    fn resolver_combines_duplicates() {
        let map = PersistentMap::new().insert("k", vec![1]);
        let map = map.insert_with("k", vec![2], |old, new| {
            let mut combined = old.clone();
            combined.extend(new);
            combined
        });

        assert_eq!(map.get(&"k"), Some(&vec![1, 2]));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn borrowed_keys_find_owned_entries() {
        use std::borrow::Cow;

        let map = PersistentMap::new()
            .insert(Cow::<'static, str>::Borrowed("static"), 1)
            .insert(Cow::Owned(String::from("owned")), 2);
        let lookup = String::from("owned");

        assert_eq!(map.get("static"), Some(&1));
        assert_eq!(map.get(lookup.as_str()), Some(&2));
        assert!(!map.contains_key("missing"));
    }

    #[test]
    fn iteration_is_ordered() {
        let map = [5, 3, 9, 1, 7]
            .into_iter()
            .fold(PersistentMap::new(), |map, k| map.insert(k, ()));

        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    }
}
