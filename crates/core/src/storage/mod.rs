mod file;
mod memory;

pub use file::FileDraftStore;
pub use memory::MemoryDraftStore;

/// Key the story draft is kept under.
pub const STORY_KEY: &str = "emovox-story";

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("draft store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("draft store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("draft store lock poisoned")]
    Poisoned,
}

/// Small string key/value store for client-local state.
///
/// Calls are synchronous and made from the controller's caller, which may be
/// a runtime worker thread. Implementations must stay small and local, like
/// a single file write; anything slower belongs behind a cache.
pub trait DraftStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<S: DraftStore + ?Sized> DraftStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}
