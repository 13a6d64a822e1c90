use crate::storage::{DraftStore, StorageError};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_owned(), value.to_owned());
        }
        self
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::STORY_KEY;

    #[test]
    fn set_overwrites_previous_value() {
        let store = MemoryDraftStore::new().with_value(STORY_KEY, "first");
        assert_eq!(store.get(STORY_KEY).unwrap().as_deref(), Some("first"));

        store.set(STORY_KEY, "second").unwrap();
        assert_eq!(store.get(STORY_KEY).unwrap().as_deref(), Some("second"));
        assert_eq!(store.get("other").unwrap(), None);
    }
}
