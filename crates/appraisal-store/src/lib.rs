//! Appraisal Store: named flat files holding structured records
//!
//! Every record file is a single YAML document holding either one record
//! (`{Goal(s): [...]}`) or a sequence of records. Free-form text inputs live
//! next to them as `.txt` files.
//!
//! ```text
//! ContinousFeedback/details/
//!   Goals.yaml  Attributes.yaml  Settings.yaml  feed_forward.yaml
//!   users_dict.yaml  final_comments.yaml  user_comments.txt
//! ```

pub mod codec;
pub mod fs;
pub mod memory;

pub use codec::{parse_records, to_yaml};
pub use fs::YamlStore;
pub use memory::MemoryStore;

use appraisal_core::Record;
use thiserror::Error;

pub const GOALS: &str = "Goals";
pub const ATTRIBUTES: &str = "Attributes";
pub const SETTINGS: &str = "Settings";
pub const FEED_FORWARD: &str = "feed_forward";
pub const USERS_DICT: &str = "users_dict";
pub const FINAL_COMMENTS: &str = "final_comments";
pub const COMMENT_REVIEWS: &str = "comment_reviews";
pub const USER_COMMENTS: &str = "user_comments";

/// Record files loaded when the caller does not override the list.
pub const DEFAULT_RECORD_FILES: [&str; 5] = [GOALS, ATTRIBUTES, SETTINGS, FEED_FORWARD, USERS_DICT];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{file}' is not valid YAML: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("'{file}' has an unexpected shape: {reason}")]
    Shape { file: String, reason: String },

    #[error("failed to serialise document: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

pub fn record_file(name: &str) -> String {
    format!("{}.yaml", name)
}

pub fn text_file(name: &str) -> String {
    format!("{}.txt", name)
}

/// Flat-file persistence for records.
///
/// Reads are idempotent and side-effect free; writes replace the whole file.
pub trait Store: Send + Sync {
    fn read_file(&self, file_name: &str) -> Result<String, StoreError>;

    fn write_file(&self, file_name: &str, contents: &str) -> Result<(), StoreError>;

    fn exists(&self, file_name: &str) -> bool;

    /// Parses the whole record file `<name>.yaml`.
    fn load(&self, name: &str) -> Result<Vec<Record>, StoreError> {
        let file = record_file(name);
        let text = self.read_file(&file)?;
        parse_records(&file, &text)
    }

    /// Reads the free-form text file `<name>.txt`.
    fn load_text(&self, name: &str) -> Result<String, StoreError> {
        self.read_file(&text_file(name))
    }

    /// Writes `records` as a YAML sequence and returns the written text.
    fn save(&self, name: &str, records: &[Record]) -> Result<String, StoreError> {
        let text = to_yaml(records)?;
        self.write_file(&record_file(name), &text)?;
        Ok(text)
    }

    /// Writes an already serialised YAML document to `<name>.yaml`.
    fn save_document(&self, name: &str, yaml: &str) -> Result<(), StoreError> {
        self.write_file(&record_file(name), yaml)
    }
}
