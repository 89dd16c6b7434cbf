use crate::Services;
use appraisal_core::{
    BatchStage, CardComment, CardItem, ContextSlot, PipelineContext, Record, StageError,
    Transition,
};
use appraisal_llm::response::field_text;
use appraisal_llm::{
    normalize_punctuation, parse_structured, CompletionRequest, Generator, ResponseSchema,
};
use appraisal_prompts::GenerationPrompt;
use appraisal_store::{to_yaml, FEED_FORWARD, USER_COMMENTS};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Drafts one comment per card of every `Goal(s)` / `Attribute(s)` record.
///
/// The feed-forward record and the associate's notes are read from the store
/// for every record, so edits between elements are picked up.
pub struct CommentsGenerator {
    services: Services,
}

/// Background shared by every card of one record.
struct Background {
    feed_forward: String,
    user_comments: String,
}

impl CommentsGenerator {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    fn background(&self) -> Result<Background, StageError> {
        let store = &self.services.store;
        let records = store
            .load(FEED_FORWARD)
            .map_err(|e| StageError::load(FEED_FORWARD, e))?;
        let feed_forward = to_yaml(&records).map_err(StageError::prompt)?;
        let user_comments = store
            .load_text(USER_COMMENTS)
            .map_err(|e| StageError::load(USER_COMMENTS, e))?;
        Ok(Background {
            feed_forward,
            user_comments,
        })
    }

    async fn draft(
        &self,
        subject: &str,
        card: &CardItem,
        background: &Background,
    ) -> Result<CardComment, StageError> {
        let previous_conversation =
            to_yaml(&card.previous_messages).map_err(StageError::prompt)?;
        let prompt = self
            .services
            .prompts
            .generation(&GenerationPrompt {
                topic: &card.card_heading,
                requirement: &card.card_text,
                previous_conversation: &previous_conversation,
                feed_forward: &background.feed_forward,
                user_comments: &background.user_comments,
            })
            .map_err(StageError::prompt)?;

        let generator = &self.services.generator;
        let request = CompletionRequest::structured(prompt, comment_schema());
        let raw = generator
            .complete(&request)
            .await
            .map_err(StageError::generation)?;

        let text = normalize_punctuation(&raw);
        let fields = parse_structured(&text, &["comment"], generator.response_format(&request))
            .map_err(|e| StageError::contract(subject, e))?;

        Ok(CardComment {
            comment: field_text(&fields, "comment").unwrap_or_default(),
            reason: field_text(&fields, "reason"),
        })
    }
}

fn comment_schema() -> ResponseSchema {
    ResponseSchema::new(
        "card_comment",
        json!({
            "type": "object",
            "properties": {
                "comment": { "type": "string" },
                "reason": { "type": "string" }
            },
            "required": ["comment", "reason"],
            "additionalProperties": false
        }),
    )
}

#[async_trait]
impl BatchStage for CommentsGenerator {
    type Item = Record;
    type ItemOutput = Record;

    fn id(&self) -> &'static str {
        "comments_generator"
    }

    fn reads(&self) -> &'static [ContextSlot] {
        &[ContextSlot::SpeedFiles]
    }

    fn writes(&self) -> &'static [ContextSlot] {
        &[ContextSlot::FinalComments]
    }

    fn prepare(&self, ctx: &PipelineContext) -> Result<Vec<Record>, StageError> {
        Ok(ctx.require_speed_files()?.to_vec())
    }

    async fn execute_item(&self, record: &Record) -> Result<Record, StageError> {
        let background = self.background()?;
        let mut cards = record.cards()?;
        let total = cards.len();

        for (index, card) in cards.iter_mut().enumerate() {
            info!(
                tab = record.key(),
                card = index + 1,
                total,
                heading = %card.card_heading,
                "drafting comment"
            );
            let subject = format!("{} {}", record.key(), index + 1);
            card.card_comment = Some(self.draft(&subject, card, &background).await?);
        }

        let mut annotated = record.clone();
        annotated.set_cards(&cards)?;
        Ok(annotated)
    }

    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        _records: Vec<Record>,
        annotated: Vec<Record>,
    ) -> Result<Transition, StageError> {
        info!(records = annotated.len(), "comments drafted");
        ctx.final_comments = Some(annotated);
        Ok(Transition::Default)
    }
}
