//! Appraisal Stages: the concrete stages of the comment pipeline
//!
//! # Pipeline Flow
//!
//! ```text
//! generate:  DataGatherer → CommentsGenerator → [CommentFinalizer → reviews] → final_comments
//! review:    [DataGatherer] → CommentsLoader → CommentFinalizer → reviews
//! ```
//!
//! Every stage shares the collaborators in [`Services`]; none of them keeps
//! state between runs.

mod comment_finalizer;
mod comments_generator;
mod comments_loader;
mod data_gatherer;
mod output_writer;

pub use comment_finalizer::{latest_turn_by, CommentFinalizer, ReviewItem};
pub use comments_generator::CommentsGenerator;
pub use comments_loader::CommentsLoader;
pub use data_gatherer::{partition, DataGatherer, Partition};
pub use output_writer::{OutputFileWriter, OutputTarget};

use appraisal_core::{Batch, Pipeline, PipelineError};
use appraisal_llm::Generator;
use appraisal_prompts::PromptBook;
use appraisal_store::{Store, USERS_DICT};
use std::sync::Arc;

/// Collaborators shared by the stages of one pipeline.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub generator: Arc<dyn Generator>,
    pub prompts: Arc<PromptBook>,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn Generator>,
        prompts: Arc<PromptBook>,
    ) -> Self {
        Self {
            store,
            generator,
            prompts,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Review drafted comments before writing them.
    pub review: bool,
    /// Associate name; wins over the stakeholder list when set.
    pub associate_name: Option<String>,
}

/// Gather → draft → (review → reviews file) → final comments file.
pub fn generation_pipeline(
    services: &Services,
    options: &PipelineOptions,
) -> Result<Pipeline, PipelineError> {
    let mut builder = Pipeline::builder()
        .then(Batch(DataGatherer::new(services.store.clone())))
        .then(Batch(CommentsGenerator::new(services.clone())));

    if options.review {
        builder = builder
            .then(Batch(CommentFinalizer::new(
                services.clone(),
                options.associate_name.clone(),
            )))
            .then(OutputFileWriter::new(
                services.store.clone(),
                OutputTarget::Reviews,
            ));
    }

    builder
        .then(OutputFileWriter::new(
            services.store.clone(),
            OutputTarget::Comments,
        ))
        .build()
}

/// Reviews a previously written final comments file.
///
/// Stakeholders are only gathered when no associate name is configured.
pub fn review_pipeline(
    services: &Services,
    options: &PipelineOptions,
) -> Result<Pipeline, PipelineError> {
    let mut builder = Pipeline::builder();
    if options.associate_name.is_none() {
        builder = builder.then(Batch(DataGatherer::only(
            services.store.clone(),
            [USERS_DICT],
        )));
    }

    builder
        .then(CommentsLoader::new(services.store.clone()))
        .then(Batch(CommentFinalizer::new(
            services.clone(),
            options.associate_name.clone(),
        )))
        .then(OutputFileWriter::new(
            services.store.clone(),
            OutputTarget::Reviews,
        ))
        .build()
}
