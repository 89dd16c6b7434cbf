//! Pipeline Context: typed state shared by the stages of one run
use crate::data_model::{Record, ReviewVerdict, Stakeholders};
use crate::error::StageError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Named slot of the [`PipelineContext`].
///
/// Stages declare the slots they need and the slots they always populate, so
/// the builder can verify a chain before anything runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextSlot {
    RecordNames,
    SpeedFiles,
    FeedForward,
    Stakeholders,
    MiscFiles,
    FinalComments,
    Reviews,
}

impl ContextSlot {
    pub const ALL: [ContextSlot; 7] = [
        ContextSlot::RecordNames,
        ContextSlot::SpeedFiles,
        ContextSlot::FeedForward,
        ContextSlot::Stakeholders,
        ContextSlot::MiscFiles,
        ContextSlot::FinalComments,
        ContextSlot::Reviews,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::RecordNames => "files",
            Self::SpeedFiles => "speed_files",
            Self::FeedForward => "feed_forward",
            Self::Stakeholders => "stakeholders",
            Self::MiscFiles => "misc_files",
            Self::FinalComments => "FinalComments",
            Self::Reviews => "reviews",
        }
    }
}

impl fmt::Display for ContextSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Overrides the record files the gatherer loads.
    pub record_names: Option<Vec<String>>,
    /// `Goal(s)` / `Attribute(s)` records, load order.
    pub speed_files: Option<Vec<Record>>,
    pub feed_forward: Option<Record>,
    pub stakeholders: Option<Stakeholders>,
    pub misc_files: Option<Vec<Record>>,
    /// Records whose cards carry `cardComment`.
    pub final_comments: Option<Vec<Record>>,
    pub reviews: Option<Vec<ReviewVerdict>>,
    pub metadata: HashMap<String, Value>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            record_names: None,
            speed_files: None,
            feed_forward: None,
            stakeholders: None,
            misc_files: None,
            final_comments: None,
            reviews: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_record_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_populated(&self, slot: ContextSlot) -> bool {
        match slot {
            ContextSlot::RecordNames => self.record_names.is_some(),
            ContextSlot::SpeedFiles => self.speed_files.is_some(),
            ContextSlot::FeedForward => self.feed_forward.is_some(),
            ContextSlot::Stakeholders => self.stakeholders.is_some(),
            ContextSlot::MiscFiles => self.misc_files.is_some(),
            ContextSlot::FinalComments => self.final_comments.is_some(),
            ContextSlot::Reviews => self.reviews.is_some(),
        }
    }

    /// Slots currently holding a value, in declaration order.
    pub fn populated_slots(&self) -> Vec<ContextSlot> {
        ContextSlot::ALL
            .into_iter()
            .filter(|slot| self.is_populated(*slot))
            .collect()
    }

    pub fn require_speed_files(&self) -> Result<&[Record], StageError> {
        self.speed_files
            .as_deref()
            .ok_or(StageError::MissingInput(ContextSlot::SpeedFiles))
    }

    pub fn require_final_comments(&self) -> Result<&[Record], StageError> {
        self.final_comments
            .as_deref()
            .ok_or(StageError::MissingInput(ContextSlot::FinalComments))
    }

    pub fn require_reviews(&self) -> Result<&[ReviewVerdict], StageError> {
        self.reviews
            .as_deref()
            .ok_or(StageError::MissingInput(ContextSlot::Reviews))
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}
