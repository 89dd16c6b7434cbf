//! In-memory store, same parsing rules as the directory store.
use crate::{Store, StoreError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, String>>,
    reads: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, file_name: &str, contents: &str) -> Self {
        self.lock_files()
            .insert(file_name.to_string(), contents.to_string());
        self
    }

    pub fn contents(&self, file_name: &str) -> Option<String> {
        self.lock_files().get(file_name).cloned()
    }

    /// File names read so far, in order.
    pub fn reads(&self) -> Vec<String> {
        self.reads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_files(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn read_file(&self, file_name: &str) -> Result<String, StoreError> {
        self.reads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(file_name.to_string());
        self.lock_files()
            .get(file_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(file_name.to_string()))
    }

    fn write_file(&self, file_name: &str, contents: &str) -> Result<(), StoreError> {
        self.lock_files()
            .insert(file_name.to_string(), contents.to_string());
        Ok(())
    }

    fn exists(&self, file_name: &str) -> bool {
        self.lock_files().contains_key(file_name)
    }
}
