use appraisal_core::{ContextSlot, PipelineContext, Stage, StageError, Transition};
use appraisal_store::{record_file, to_yaml, Store, COMMENT_REVIEWS, FINAL_COMMENTS};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// What an [`OutputFileWriter`] persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// `ctx.final_comments` to `final_comments.yaml`; ends the run.
    Comments,
    /// `ctx.reviews` to `comment_reviews.yaml`.
    Reviews,
}

impl OutputTarget {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Comments => FINAL_COMMENTS,
            Self::Reviews => COMMENT_REVIEWS,
        }
    }
}

/// Serialises one context slot and replaces its output file.
///
/// Writing the same context twice yields byte-identical files.
pub struct OutputFileWriter {
    store: Arc<dyn Store>,
    target: OutputTarget,
}

impl OutputFileWriter {
    pub fn new(store: Arc<dyn Store>, target: OutputTarget) -> Self {
        Self { store, target }
    }

    pub fn target(&self) -> OutputTarget {
        self.target
    }
}

#[async_trait]
impl Stage for OutputFileWriter {
    type Input = String;
    type Output = String;

    fn id(&self) -> &'static str {
        match self.target {
            OutputTarget::Comments => "output_writer.comments",
            OutputTarget::Reviews => "output_writer.reviews",
        }
    }

    fn reads(&self) -> &'static [ContextSlot] {
        match self.target {
            OutputTarget::Comments => &[ContextSlot::FinalComments],
            OutputTarget::Reviews => &[ContextSlot::Reviews],
        }
    }

    fn prepare(&self, ctx: &PipelineContext) -> Result<String, StageError> {
        let document = match self.target {
            OutputTarget::Comments => to_yaml(ctx.require_final_comments()?),
            OutputTarget::Reviews => to_yaml(ctx.require_reviews()?),
        };
        document.map_err(|e| StageError::write(self.target.file_name(), e))
    }

    async fn execute(&self, document: &String) -> Result<String, StageError> {
        let name = self.target.file_name();
        self.store
            .save_document(name, document)
            .map_err(|e| StageError::write(name, e))?;
        Ok(format!("blake3:{}", blake3::hash(document.as_bytes()).to_hex()))
    }

    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        document: String,
        digest: String,
    ) -> Result<Transition, StageError> {
        let name = self.target.file_name();
        info!(
            file = %record_file(name),
            bytes = document.len(),
            digest = %digest,
            "output written"
        );
        ctx.metadata
            .insert(format!("{}_digest", name), json!(digest));

        Ok(match self.target {
            OutputTarget::Comments => Transition::Stop,
            OutputTarget::Reviews => Transition::Default,
        })
    }
}
