//! Appraisal Core: Stage contracts, Pipeline runner and Data Model
//!
//! A run is a linear, directed chain of stages sharing one typed
//! [`PipelineContext`]. Every stage goes through the same three phases:
//!
//! ```text
//! prepare(ctx) → execute(input) → finalize(ctx, input, output) → Transition
//! ```
//!
//! [`BatchStage`] runs its execute phase once per element, strictly in order.
//! The chain is resolved and checked when the [`Pipeline`] is built, never at
//! run time.

pub mod context;
pub mod data_model;
pub mod error;
pub mod runner;
pub mod stage;

pub use context::{ContextSlot, PipelineContext};
pub use data_model::{
    CardComment, CardItem, Message, Record, RecordKind, ReviewSuggestion, ReviewVerdict,
    Stakeholder, Stakeholders,
};
pub use error::{BoxError, PipelineError, RecordError, StageError};
pub use runner::{Pipeline, PipelineBuilder, RunReport, StageReport};
pub use stage::{Batch, BatchStage, Node, Stage, Transition};

pub use tokio_util::sync::CancellationToken;
