use appraisal_core::{
    BatchStage, ContextSlot, PipelineContext, Record, RecordError, RecordKind, StageError,
    Stakeholders, Transition,
};
use appraisal_core::data_model::STAKEHOLDERS_KEY;
use appraisal_store::{Store, DEFAULT_RECORD_FILES};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Loads record files and sorts them into context slots.
pub struct DataGatherer {
    store: Arc<dyn Store>,
    defaults: Vec<String>,
}

impl DataGatherer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::only(store, DEFAULT_RECORD_FILES)
    }

    /// Loads `names` unless the context overrides the list.
    pub fn only<I, S>(store: Arc<dyn Store>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            defaults: names.into_iter().map(Into::into).collect(),
        }
    }
}

/// Loaded records sorted by their semantic key.
#[derive(Debug, Default, PartialEq)]
pub struct Partition {
    pub speed_files: Vec<Record>,
    pub feed_forward: Option<Record>,
    pub stakeholders: Option<Stakeholders>,
    pub misc_files: Vec<Record>,
}

/// Goal(s)/Attribute(s) go to `speed_files`, `FeedForward` stands alone,
/// everything else is miscellaneous. Input order is kept.
pub fn partition<I>(records: I) -> Result<Partition, RecordError>
where
    I: IntoIterator<Item = Record>,
{
    let mut partition = Partition::default();
    for record in records {
        match record.kind() {
            RecordKind::Goals | RecordKind::Attributes => partition.speed_files.push(record),
            RecordKind::FeedForward => partition.feed_forward = Some(record),
            RecordKind::Other(key) => {
                if key == STAKEHOLDERS_KEY {
                    partition.stakeholders = Some(Stakeholders::from_record(&record)?);
                }
                partition.misc_files.push(record);
            }
        }
    }
    Ok(partition)
}

#[async_trait]
impl BatchStage for DataGatherer {
    type Item = String;
    type ItemOutput = Vec<Record>;

    fn id(&self) -> &'static str {
        "data_gatherer"
    }

    fn writes(&self) -> &'static [ContextSlot] {
        &[ContextSlot::SpeedFiles, ContextSlot::MiscFiles]
    }

    fn prepare(&self, ctx: &PipelineContext) -> Result<Vec<String>, StageError> {
        Ok(ctx
            .record_names
            .clone()
            .unwrap_or_else(|| self.defaults.clone()))
    }

    async fn execute_item(&self, name: &String) -> Result<Vec<Record>, StageError> {
        info!(file = %name, "loading record file");
        self.store
            .load(name)
            .map_err(|e| StageError::load(name.as_str(), e))
    }

    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        _names: Vec<String>,
        loaded: Vec<Vec<Record>>,
    ) -> Result<Transition, StageError> {
        let partition = partition(loaded.into_iter().flatten())?;
        info!(
            speed_files = partition.speed_files.len(),
            feed_forward = partition.feed_forward.is_some(),
            stakeholders = partition.stakeholders.is_some(),
            misc_files = partition.misc_files.len(),
            "records gathered"
        );

        ctx.speed_files = Some(partition.speed_files);
        ctx.misc_files = Some(partition.misc_files);
        if partition.feed_forward.is_some() {
            ctx.feed_forward = partition.feed_forward;
        }
        if partition.stakeholders.is_some() {
            ctx.stakeholders = partition.stakeholders;
        }
        Ok(Transition::Default)
    }
}
