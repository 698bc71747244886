use std::collections::BTreeMap;

/// Origin-scoped key/value storage (`window.localStorage`).
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    items: BTreeMap<String, String>,
}

impl LocalStorage {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.items.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut storage = LocalStorage::default();
        storage.set("theme", "dark");
        assert_eq!(storage.get("theme"), Some("dark"));
        assert!(storage.remove("theme"));
        assert!(!storage.remove("theme"));
        assert_eq!(storage.get("theme"), None);
    }

    #[test]
    fn clear_empties_keys() {
        let mut storage = LocalStorage::default();
        storage.set("a", "1");
        storage.set("b", "2");
        assert_eq!(storage.keys(), vec!["a".to_string(), "b".to_string()]);
        storage.clear();
        assert!(storage.keys().is_empty());
    }
}
