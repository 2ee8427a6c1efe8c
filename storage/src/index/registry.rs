use std::collections::HashMap;
use std::hash::Hash;

/// Maps external identifiers to dense zero-based node indices for one graph
/// build. Construct it at the start of a build and drop it at the end.
#[derive(Debug, Clone)]
pub struct IdRegistry<K = String> {
    indices: HashMap<K, usize>,
    keys: Vec<K>,
}

impl<K: Eq + Hash + Clone> IdRegistry<K> {
    pub fn new() -> Self {
        Self {
            indices: HashMap::new(),
            keys: Vec::new(),
        }
    }

    /// Returns the index for `key`, allocating the next free one on first use.
    pub fn register(&mut self, key: K) -> usize {
        if let Some(index) = self.indices.get(&key) {
            return *index;
        }
        let index = self.keys.len();
        self.indices.insert(key.clone(), index);
        self.keys.push(key);
        index
    }

    /// Like [`register`](Self::register) but also reports whether the key was new.
    pub fn register_new(&mut self, key: K) -> (usize, bool) {
        let before = self.keys.len();
        let index = self.register(key);
        (index, self.keys.len() > before)
    }

    pub fn get(&self, key: &K) -> Option<usize> {
        self.indices.get(key).copied()
    }

    /// Keys in index order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for IdRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_dense_indices_in_first_seen_order() {
        let mut registry = IdRegistry::new();
        assert_eq!(registry.register("post".to_string()), 0);
        assert_eq!(registry.register("c1".to_string()), 1);
        assert_eq!(registry.register("c2".to_string()), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn repeated_keys_return_the_same_index() {
        let mut registry = IdRegistry::new();
        registry.register("a".to_string());
        assert_eq!(registry.register_new("b".to_string()), (1, true));
        assert_eq!(registry.register_new("a".to_string()), (0, false));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn lookup_does_not_register() {
        let mut registry: IdRegistry<&str> = IdRegistry::new();
        registry.register("known");
        assert_eq!(registry.get(&"known"), Some(0));
        assert_eq!(registry.get(&"unknown"), None);
        assert_eq!(registry.len(), 1);
    }
}
