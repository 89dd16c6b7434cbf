//! Unified Error Model
use crate::context::ContextSlot;
use thiserror::Error;

/// Boxed collaborator error, kept intact so callers can downcast it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shape violations of a [`crate::Record`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("RECORD/expected exactly one top-level key, found {0}")]
    KeyCount(usize),

    #[error("RECORD/top-level key must be a string")]
    NonStringKey,

    #[error("RECORD/'{key}' does not hold card items: {reason}")]
    NotCards { key: String, reason: String },
}

/// Failure of a single stage phase. Nothing is retried; the runner stops at
/// the first one.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("CONTEXT/{0} has not been populated")]
    MissingInput(ContextSlot),

    #[error("LOAD/{name}: {source}")]
    Load {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("GENERATE/{0}")]
    Generation(#[source] BoxError),

    #[error("CONTRACT/{subject}: {source}")]
    Contract {
        subject: String,
        #[source]
        source: BoxError,
    },

    #[error("PROMPT/{0}")]
    Prompt(#[source] BoxError),

    #[error("WRITE/{name}: {source}")]
    Write {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("STAGE/EXEC: {0}")]
    Execution(String),
}

impl StageError {
    pub fn load(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Load {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn contract(subject: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Contract {
            subject: subject.into(),
            source: source.into(),
        }
    }

    pub fn generation(source: impl Into<BoxError>) -> Self {
        Self::Generation(source.into())
    }

    pub fn prompt(source: impl Into<BoxError>) -> Self {
        Self::Prompt(source.into())
    }

    pub fn write(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Write {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Errors raised while building or running a [`crate::Pipeline`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("BUILD/pipeline has no stages")]
    Empty,

    #[error("BUILD/stage id '{0}' registered twice")]
    DuplicateStage(String),

    #[error("BUILD/unknown stage '{0}'")]
    UnknownStage(String),

    #[error("BUILD/cycle detected: {}", path.join(" → "))]
    Cycle { path: Vec<String> },

    #[error("BUILD/stage '{stage}' reads {slot} but no stage before it writes it")]
    UnsatisfiedInput { stage: String, slot: ContextSlot },

    #[error("RUN/{stage}: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("RUN/cancelled while running '{stage}'")]
    Cancelled { stage: String },
}

impl PipelineError {
    /// The stage error behind a run failure, if any.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::Stage { source, .. } => Some(source),
            _ => None,
        }
    }
}
