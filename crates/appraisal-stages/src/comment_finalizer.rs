use crate::Services;
use appraisal_core::{
    BatchStage, CardItem, ContextSlot, PipelineContext, Record, ReviewSuggestion, ReviewVerdict,
    StageError, Transition,
};
use appraisal_llm::response::{field_bool, field_text};
use appraisal_llm::{
    normalize_punctuation, parse_structured, CompletionRequest, Generator, ResponseError,
};
use appraisal_prompts::ReviewPrompt;
use appraisal_store::to_yaml;
use async_trait::async_trait;
use tracing::{info, warn};

/// Checks every drafted comment against its card and conversation.
///
/// Verdicts are advisory: they land in `ctx.reviews` and the final comments
/// are never touched.
pub struct CommentFinalizer {
    services: Services,
    associate_name: Option<String>,
}

/// One record to review, with the associate resolved at prepare time.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub record: Record,
    pub associate: Option<String>,
}

/// True when the latest real turn on `card` was written by `associate`.
pub fn latest_turn_by(card: &CardItem, associate: &str) -> bool {
    card.latest_turn()
        .and_then(|message| message.message_by.as_deref())
        .map_or(false, |by| by.trim().eq_ignore_ascii_case(associate.trim()))
}

impl CommentFinalizer {
    pub fn new(services: Services, associate_name: Option<String>) -> Self {
        Self {
            services,
            associate_name,
        }
    }

    fn associate(&self, ctx: &PipelineContext) -> Option<String> {
        self.associate_name.clone().or_else(|| {
            ctx.stakeholders
                .as_ref()
                .and_then(|stakeholders| stakeholders.associate())
                .map(|stakeholder| stakeholder.name.clone())
        })
    }

    async fn review(
        &self,
        subject: &str,
        card: &CardItem,
        comment: &str,
        associate: Option<&str>,
    ) -> Result<ReviewSuggestion, StageError> {
        let previous_conversation =
            to_yaml(&card.previous_messages).map_err(StageError::prompt)?;
        let prompt = self
            .services
            .prompts
            .review(&ReviewPrompt {
                topic: &card.card_heading,
                requirement: &card.card_text,
                previous_conversation: &previous_conversation,
                comment,
                associate,
            })
            .map_err(StageError::prompt)?;

        let generator = &self.services.generator;
        let request = CompletionRequest::text(prompt);
        let raw = generator
            .complete(&request)
            .await
            .map_err(StageError::generation)?;

        let text = normalize_punctuation(&raw);
        let fields = parse_structured(
            &text,
            &["comment_changed"],
            generator.response_format(&request),
        )
        .map_err(|e| StageError::contract(subject, e))?;
        let comment_changed = field_bool(&fields, "comment_changed").ok_or_else(|| {
            StageError::contract(
                subject,
                ResponseError::InvalidSyntax("comment_changed is not a boolean".to_string()),
            )
        })?;

        Ok(ReviewSuggestion {
            comment_changed,
            reason_for_change: field_text(&fields, "reason_for_change").filter(|s| !s.is_empty()),
            suggested_comment: field_text(&fields, "suggested_comment").filter(|s| !s.is_empty()),
        })
    }
}

#[async_trait]
impl BatchStage for CommentFinalizer {
    type Item = ReviewItem;
    type ItemOutput = Vec<ReviewVerdict>;

    fn id(&self) -> &'static str {
        "comment_finalizer"
    }

    fn reads(&self) -> &'static [ContextSlot] {
        &[ContextSlot::FinalComments]
    }

    fn writes(&self) -> &'static [ContextSlot] {
        &[ContextSlot::Reviews]
    }

    fn prepare(&self, ctx: &PipelineContext) -> Result<Vec<ReviewItem>, StageError> {
        let records = ctx.require_final_comments()?;
        let associate = self.associate(ctx);
        if associate.is_none() {
            warn!("associate unknown, last-word check disabled");
        }
        Ok(records
            .iter()
            .map(|record| ReviewItem {
                record: record.clone(),
                associate: associate.clone(),
            })
            .collect())
    }

    async fn execute_item(&self, item: &ReviewItem) -> Result<Vec<ReviewVerdict>, StageError> {
        let tab = item.record.key();
        let mut verdicts = Vec::new();

        for (index, card) in item.record.cards()?.iter().enumerate() {
            let Some(drafted) = card.card_comment.as_ref() else {
                continue;
            };
            let must_be_empty = item
                .associate
                .as_deref()
                .map_or(false, |associate| latest_turn_by(card, associate));

            let suggestion = if must_be_empty {
                info!(tab, card = index + 1, "associate has the last word, comment must stay empty");
                None
            } else {
                info!(tab, card = index + 1, heading = %card.card_heading, "reviewing comment");
                let subject = format!("{} {}", tab, index + 1);
                Some(
                    self.review(&subject, card, &drafted.comment, item.associate.as_deref())
                        .await?,
                )
            };

            verdicts.push(ReviewVerdict {
                tab: tab.to_string(),
                card_no: card.card_no,
                card_heading: card.card_heading.clone(),
                original_comment: drafted.comment.clone(),
                must_be_empty,
                suggestion,
            });
        }
        Ok(verdicts)
    }

    fn finalize(
        &self,
        ctx: &mut PipelineContext,
        _items: Vec<ReviewItem>,
        verdicts: Vec<Vec<ReviewVerdict>>,
    ) -> Result<Transition, StageError> {
        let verdicts: Vec<ReviewVerdict> = verdicts.into_iter().flatten().collect();
        let flagged = verdicts
            .iter()
            .filter(|v| {
                v.must_be_empty || v.suggestion.as_ref().map_or(false, |s| s.comment_changed)
            })
            .count();
        info!(reviewed = verdicts.len(), flagged, "comments reviewed");
        ctx.reviews = Some(verdicts);
        Ok(Transition::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appraisal_core::{Batch, Message, Node, Stakeholder, Stakeholders};
    use appraisal_llm::ScriptedGenerator;
    use appraisal_prompts::PromptBook;
    use appraisal_store::MemoryStore;
    use std::sync::Arc;

    const FINAL: &str = r#"
Goal(s):
- cardNo: 0
  cardHeading: Delivery
  cardText: Ship X by Q3
  previousmessages:
  - messageBy: Sam Roe
    messageBody: Any update?
  - messageBy: Jane Doe
    messageBody: Shipped last week.
  cardComment:
    comment: Shipped X on time
    reason: met deadline
- cardNo: 1
  cardHeading: Quality
  cardText: Fewer escapes
  previousmessages:
  - messageBy: Jane Doe
    messageBody: Working on it.
  - messageBy: Sam Roe
    messageBody: Great, keep going.
  cardComment:
    comment: Cut escapes in half
"#;

    const REVIEW: &str = "```yaml\noriginal_comment: Cut escapes in half\ncomment_changed: true\nreason_for_change: answer the manager\nsuggested_comment: Thanks, escapes are down by half\n```";

    fn stage(generator: Arc<ScriptedGenerator>, associate: Option<&str>) -> Batch<CommentFinalizer> {
        let services = Services::new(
            Arc::new(MemoryStore::new()),
            generator,
            Arc::new(PromptBook::bundled().unwrap()),
        );
        Batch(CommentFinalizer::new(services, associate.map(str::to_string)))
    }

    fn ctx() -> PipelineContext {
        let mut ctx = PipelineContext::new();
        ctx.final_comments = Some(vec![serde_yaml::from_str(FINAL).unwrap()]);
        ctx
    }

    #[test]
    fn test_latest_turn_by() {
        let mut card = CardItem::new("Delivery", "Ship X");
        assert!(!latest_turn_by(&card, "Jane Doe"));

        card.previous_messages = vec![
            Message::new("Sam Roe", "Any update?"),
            Message::new(" jane doe ", "Done."),
            Message {
                message_by: None,
                message_body: None,
            },
        ];
        assert!(latest_turn_by(&card, "Jane Doe"));
        assert!(!latest_turn_by(&card, "Sam Roe"));
    }

    #[tokio::test]
    async fn test_flags_associate_last_word_without_calling_model() {
        let generator = Arc::new(ScriptedGenerator::new([REVIEW]));
        let stage = stage(generator.clone(), Some("Jane Doe"));
        let mut ctx = ctx();
        let before = ctx.final_comments.clone();

        stage.run_cycle(&mut ctx).await.unwrap();

        let reviews = ctx.reviews.as_ref().unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews[0].must_be_empty);
        assert!(reviews[0].suggestion.is_none());
        assert!(!reviews[1].must_be_empty);
        let suggestion = reviews[1].suggestion.as_ref().unwrap();
        assert!(suggestion.comment_changed);
        assert_eq!(
            suggestion.suggested_comment.as_deref(),
            Some("Thanks, escapes are down by half")
        );
        assert_eq!(generator.calls(), 1);
        assert_eq!(ctx.final_comments, before);
    }

    #[tokio::test]
    async fn test_associate_from_stakeholders() {
        let generator = Arc::new(ScriptedGenerator::repeating(REVIEW));
        let stage = stage(generator.clone(), None);
        let mut ctx = ctx();
        ctx.stakeholders = Some(Stakeholders(vec![Stakeholder {
            name: "Jane Doe".to_string(),
            role: "Associate".to_string(),
            emp_id: "42".to_string(),
        }]));

        stage.run_cycle(&mut ctx).await.unwrap();

        assert!(ctx.reviews.unwrap()[0].must_be_empty);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_configured_associate_wins_over_stakeholders() {
        let generator = Arc::new(ScriptedGenerator::new([REVIEW]));
        let stage = stage(generator.clone(), Some("Sam Roe"));
        let mut ctx = ctx();
        ctx.stakeholders = Some(Stakeholders(vec![Stakeholder {
            name: "Jane Doe".to_string(),
            role: "Associate".to_string(),
            emp_id: "42".to_string(),
        }]));

        stage.run_cycle(&mut ctx).await.unwrap();

        let reviews = ctx.reviews.unwrap();
        assert!(!reviews[0].must_be_empty);
        assert!(reviews[0].suggestion.is_some());
        assert!(reviews[1].must_be_empty);
        assert!(reviews[1].suggestion.is_none());
        assert_eq!(generator.calls(), 1);
        assert!(generator.prompts()[0].contains("from the associate (Sam Roe)"));
    }

    #[tokio::test]
    async fn test_unknown_associate_reviews_everything() {
        let generator = Arc::new(ScriptedGenerator::repeating(REVIEW));
        let stage = stage(generator.clone(), None);
        let mut ctx = ctx();

        stage.run_cycle(&mut ctx).await.unwrap();

        assert!(ctx.reviews.unwrap().iter().all(|v| !v.must_be_empty));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_boolean_verdict_is_contract_error() {
        let generator = Arc::new(ScriptedGenerator::repeating(
            "```yaml\ncomment_changed: maybe\n```",
        ));
        let stage = stage(generator, Some("Jane Doe"));
        let mut ctx = ctx();

        let err = stage.run_cycle(&mut ctx).await.unwrap_err();

        assert!(matches!(err, StageError::Contract { ref subject, .. } if subject == "Goal(s) 2"));
        assert!(ctx.reviews.is_none());
    }
}
