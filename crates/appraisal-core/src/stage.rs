//! Stage Trait: prepare / execute / finalize contract shared by every stage
use crate::context::{ContextSlot, PipelineContext};
use crate::error::StageError;
use async_trait::async_trait;
use tracing::{debug, error};

/// What a stage asks the runner to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transition {
    /// Follow the default successor, if one is linked.
    Default,
    /// Follow the successor linked under this action name, if any.
    Action(&'static str),
    /// End the run.
    Stop,
}

impl Transition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Action(name) => name,
            Self::Stop => "stop",
        }
    }
}

/// A single unit of work.
///
/// Side effects belong in `execute` (external calls, file I/O) and
/// `finalize` (context mutation). `prepare` only reads.
#[async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// Unique stage id (ex: "comments_generator")
    fn id(&self) -> &'static str;

    /// Context slots that must be populated before `prepare`.
    fn reads(&self) -> &'static [ContextSlot] {
        &[]
    }

    /// Context slots `finalize` always populates.
    fn writes(&self) -> &'static [ContextSlot] {
        &[]
    }

    fn prepare(&self, ctx: &PipelineContext) -> Result<Self::Input, StageError>;

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, StageError>;

    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        input: Self::Input,
        output: Self::Output,
    ) -> Result<Transition, StageError>;
}

/// A stage whose execute phase runs once per prepared element.
///
/// Elements run one after another in prepare order; the first failure aborts
/// the batch and nothing reaches `finalize`.
#[async_trait]
pub trait BatchStage: Send + Sync {
    type Item: Send + Sync;
    type ItemOutput: Send;

    fn id(&self) -> &'static str;

    fn reads(&self) -> &'static [ContextSlot] {
        &[]
    }

    fn writes(&self) -> &'static [ContextSlot] {
        &[]
    }

    fn prepare(&self, ctx: &PipelineContext) -> Result<Vec<Self::Item>, StageError>;

    async fn execute_item(&self, item: &Self::Item) -> Result<Self::ItemOutput, StageError>;

    /// `outputs[i]` belongs to `items[i]`.
    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        items: Vec<Self::Item>,
        outputs: Vec<Self::ItemOutput>,
    ) -> Result<Transition, StageError>;
}

/// Adapts a [`BatchStage`] into a [`Stage`].
pub struct Batch<S>(pub S);

impl<S> Batch<S> {
    pub fn inner(&self) -> &S {
        &self.0
    }
}

#[async_trait]
impl<S> Stage for Batch<S>
where
    S: BatchStage,
{
    type Input = Vec<S::Item>;
    type Output = Vec<S::ItemOutput>;

    fn id(&self) -> &'static str {
        self.0.id()
    }

    fn reads(&self) -> &'static [ContextSlot] {
        self.0.reads()
    }

    fn writes(&self) -> &'static [ContextSlot] {
        self.0.writes()
    }

    fn prepare(&self, ctx: &PipelineContext) -> Result<Self::Input, StageError> {
        self.0.prepare(ctx)
    }

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, StageError> {
        let mut outputs = Vec::with_capacity(input.len());
        for (index, item) in input.iter().enumerate() {
            debug!(stage = self.0.id(), index, total = input.len(), "batch element");
            match self.0.execute_item(item).await {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    error!(stage = self.0.id(), index, error = %e, "batch element failed, aborting batch");
                    return Err(e);
                }
            }
        }
        Ok(outputs)
    }

    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        input: Self::Input,
        output: Self::Output,
    ) -> Result<Transition, StageError> {
        self.0.finalize(ctx, input, output)
    }
}

/// Object-safe view of a [`Stage`] used by the runner.
#[async_trait]
pub trait Node: Send + Sync {
    fn stage_id(&self) -> &'static str;

    fn input_slots(&self) -> &'static [ContextSlot];

    fn output_slots(&self) -> &'static [ContextSlot];

    /// Runs the full prepare → execute → finalize cycle.
    async fn run_cycle(&self, ctx: &mut PipelineContext) -> Result<Transition, StageError>;
}

#[async_trait]
impl<S> Node for S
where
    S: Stage,
{
    fn stage_id(&self) -> &'static str {
        Stage::id(self)
    }

    fn input_slots(&self) -> &'static [ContextSlot] {
        Stage::reads(self)
    }

    fn output_slots(&self) -> &'static [ContextSlot] {
        Stage::writes(self)
    }

    async fn run_cycle(&self, ctx: &mut PipelineContext) -> Result<Transition, StageError> {
        let input = self.prepare(ctx)?;
        let output = self.execute(&input).await?;
        self.finalize(ctx, input, output)
    }
}
