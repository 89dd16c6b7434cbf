use appraisal_core::{ContextSlot, PipelineContext, Record, Stage, StageError, Transition};
use appraisal_store::{Store, FINAL_COMMENTS};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Reads a previously written final comments file back into the context.
pub struct CommentsLoader {
    store: Arc<dyn Store>,
}

impl CommentsLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for CommentsLoader {
    type Input = ();
    type Output = Vec<Record>;

    fn id(&self) -> &'static str {
        "comments_loader"
    }

    fn writes(&self) -> &'static [ContextSlot] {
        &[ContextSlot::FinalComments]
    }

    fn prepare(&self, _ctx: &PipelineContext) -> Result<(), StageError> {
        Ok(())
    }

    async fn execute(&self, _input: &()) -> Result<Vec<Record>, StageError> {
        self.store
            .load(FINAL_COMMENTS)
            .map_err(|e| StageError::load(FINAL_COMMENTS, e))
    }

    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        _input: (),
        records: Vec<Record>,
    ) -> Result<Transition, StageError> {
        info!(records = records.len(), "final comments loaded");
        ctx.final_comments = Some(records);
        Ok(Transition::Default)
    }
}
