//! End-to-end runs of the generation and review pipelines against the
//! sample record files in `testing/fixtures/details`.

use appraisal_core::{CardComment, PipelineContext, PipelineError, Record, StageError};
use appraisal_llm::{ResponseError, ScriptedGenerator};
use appraisal_prompts::PromptBook;
use appraisal_stages::{generation_pipeline, review_pipeline, PipelineOptions, Services};
use appraisal_store::{MemoryStore, Store, YamlStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DRAFT: &str = "Sure, here it is:\n```yaml\ncomment: \"Shipped X on time\"\nreason: \"met deadline\"\n```\n";
const KEEP: &str = "```yaml\noriginal_comment: Shipped X on time\ncomment_changed: false\nreason_for_change: null\nsuggested_comment: null\n```";

fn fixtures_dir() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    Path::new(&manifest_dir)
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("testing/fixtures/details")
}

/// Copies the fixture files into a fresh directory.
fn fixture_store() -> (tempfile::TempDir, Arc<YamlStore>) {
    let dir = tempfile::tempdir().unwrap();
    for entry in std::fs::read_dir(fixtures_dir()).unwrap() {
        let path = entry.unwrap().path();
        std::fs::copy(&path, dir.path().join(path.file_name().unwrap())).unwrap();
    }
    let store = Arc::new(YamlStore::new(dir.path()));
    (dir, store)
}

fn services(store: Arc<dyn Store>, generator: Arc<ScriptedGenerator>) -> Services {
    Services::new(store, generator, Arc::new(PromptBook::bundled().unwrap()))
}

fn delivery_store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_file(
                "Goals.yaml",
                "Goal(s):\n- cardNo: 0\n  cardHeading: Delivery\n  cardText: Ship X by Q3\n  previousmessages: []\n",
            )
            .with_file("Attributes.yaml", "Attribute(s): []\n")
            .with_file("Settings.yaml", "settings:\n  Year: '2025'\n")
            .with_file("feed_forward.yaml", "FeedForward:\n  Strengths: [Focus]\n")
            .with_file("users_dict.yaml", "stakeholders:\n- Name: Jane Doe\n")
            .with_file("user_comments.txt", "Shipped X two weeks early."),
    )
}

#[tokio::test]
async fn test_delivery_card_gets_comment() {
    let store = delivery_store();
    let generator = Arc::new(ScriptedGenerator::repeating(DRAFT));
    let pipeline =
        generation_pipeline(&services(store.clone(), generator), &PipelineOptions::default())
            .unwrap();
    let mut ctx = PipelineContext::new();

    let report = pipeline.run(&mut ctx).await.unwrap();

    assert_eq!(
        report.visited(),
        vec!["data_gatherer", "comments_generator", "output_writer.comments"]
    );
    let written = store.contents("final_comments.yaml").unwrap();
    let records: Vec<Record> = serde_yaml::from_str(&written).unwrap();
    assert_eq!(records.len(), 2);
    let cards = records[0].cards().unwrap();
    assert_eq!(
        cards[0].card_comment,
        Some(CardComment {
            comment: "Shipped X on time".to_string(),
            reason: Some("met deadline".to_string()),
        })
    );
    assert!(records[1].cards().unwrap().is_empty());
}

#[tokio::test]
async fn test_background_is_reread_per_record() {
    let store = delivery_store();
    let generator = Arc::new(ScriptedGenerator::repeating(DRAFT));
    let pipeline =
        generation_pipeline(&services(store.clone(), generator), &PipelineOptions::default())
            .unwrap();

    pipeline.run(&mut PipelineContext::new()).await.unwrap();

    let reads = store.reads();
    let count = |name: &str| reads.iter().filter(|r| r.as_str() == name).count();
    // Once while gathering, then once per speed file.
    assert_eq!(count("feed_forward.yaml"), 3);
    assert_eq!(count("user_comments.txt"), 2);
}

#[tokio::test]
async fn test_missing_fence_halts_before_writer() {
    let store = delivery_store();
    let generator = Arc::new(ScriptedGenerator::repeating(
        "Here is a comment: shipped X on time.",
    ));
    let pipeline =
        generation_pipeline(&services(store.clone(), generator), &PipelineOptions::default())
            .unwrap();
    let mut ctx = PipelineContext::new();

    let err = pipeline.run(&mut ctx).await.unwrap_err();

    match err {
        PipelineError::Stage {
            stage,
            source: StageError::Contract { subject, source },
        } => {
            assert_eq!(stage, "comments_generator");
            assert_eq!(subject, "Goal(s) 1");
            assert_eq!(
                source.downcast_ref::<ResponseError>(),
                Some(&ResponseError::MissingFence)
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(ctx.final_comments.is_none());
    assert!(!store.exists("final_comments.yaml"));
}

#[tokio::test]
async fn test_generation_is_idempotent_on_disk() {
    let (dir, store) = fixture_store();
    let generator = Arc::new(ScriptedGenerator::repeating(DRAFT));
    let pipeline =
        generation_pipeline(&services(store.clone(), generator), &PipelineOptions::default())
            .unwrap();
    let output = dir.path().join("final_comments.yaml");

    let mut first_ctx = PipelineContext::new();
    pipeline.run(&mut first_ctx).await.unwrap();
    let first = std::fs::read(&output).unwrap();
    pipeline.run(&mut PipelineContext::new()).await.unwrap();
    let second = std::fs::read(&output).unwrap();

    assert_eq!(first, second);
    let reloaded = store.load("final_comments").unwrap();
    assert_eq!(Some(reloaded), first_ctx.final_comments);
}

#[tokio::test]
async fn test_generation_with_review() {
    let (dir, store) = fixture_store();
    // Three drafts, then reviews for the two cards where the manager spoke last
    // or nobody spoke at all.
    let generator = Arc::new(ScriptedGenerator::new([DRAFT, DRAFT, DRAFT, KEEP, KEEP]));
    let options = PipelineOptions {
        review: true,
        associate_name: None,
    };
    let pipeline = generation_pipeline(&services(store.clone(), generator.clone()), &options)
        .unwrap();
    let mut ctx = PipelineContext::new();

    let report = pipeline.run(&mut ctx).await.unwrap();

    assert_eq!(
        report.visited(),
        vec![
            "data_gatherer",
            "comments_generator",
            "comment_finalizer",
            "output_writer.reviews",
            "output_writer.comments",
        ]
    );
    assert_eq!(generator.calls(), 5);

    let reviews = ctx.reviews.unwrap();
    let flagged: Vec<&str> = reviews
        .iter()
        .filter(|v| v.must_be_empty)
        .map(|v| v.card_heading.as_str())
        .collect();
    assert_eq!(flagged, vec!["Quality"]);
    assert!(dir.path().join("comment_reviews.yaml").exists());
    assert!(dir.path().join("final_comments.yaml").exists());
}

#[tokio::test]
async fn test_review_pipeline_reads_written_comments() {
    let (dir, store) = fixture_store();
    let drafts = Arc::new(ScriptedGenerator::repeating(DRAFT));
    generation_pipeline(&services(store.clone(), drafts), &PipelineOptions::default())
        .unwrap()
        .run(&mut PipelineContext::new())
        .await
        .unwrap();
    let comments_before = std::fs::read(dir.path().join("final_comments.yaml")).unwrap();

    let reviewer = Arc::new(ScriptedGenerator::repeating(KEEP));
    let pipeline =
        review_pipeline(&services(store.clone(), reviewer.clone()), &PipelineOptions::default())
            .unwrap();
    let mut ctx = PipelineContext::new();
    let report = pipeline.run(&mut ctx).await.unwrap();

    assert_eq!(
        report.visited(),
        vec![
            "data_gatherer",
            "comments_loader",
            "comment_finalizer",
            "output_writer.reviews",
        ]
    );
    assert_eq!(reviewer.calls(), 2);
    assert_eq!(ctx.reviews.as_ref().unwrap().len(), 3);
    assert_eq!(
        std::fs::read(dir.path().join("final_comments.yaml")).unwrap(),
        comments_before
    );
}

#[tokio::test]
async fn test_review_pipeline_with_configured_associate() {
    let (_dir, store) = fixture_store();
    let drafts = Arc::new(ScriptedGenerator::repeating(DRAFT));
    generation_pipeline(&services(store.clone(), drafts), &PipelineOptions::default())
        .unwrap()
        .run(&mut PipelineContext::new())
        .await
        .unwrap();

    let reviewer = Arc::new(ScriptedGenerator::repeating(KEEP));
    let options = PipelineOptions {
        associate_name: Some("Sam Roe".to_string()),
        ..PipelineOptions::default()
    };
    let pipeline = review_pipeline(&services(store, reviewer.clone()), &options).unwrap();
    let mut ctx = PipelineContext::new();
    let report = pipeline.run(&mut ctx).await.unwrap();

    assert_eq!(report.visited()[0], "comments_loader");
    // Sam Roe spoke last on the Ownership card only.
    let flagged: Vec<&str> = ctx
        .reviews
        .as_ref()
        .unwrap()
        .iter()
        .filter(|v| v.must_be_empty)
        .map(|v| v.card_heading.as_str())
        .collect();
    assert_eq!(flagged, vec!["Ownership"]);
    assert_eq!(reviewer.calls(), 2);
}

#[tokio::test]
async fn test_configured_associate_wins_over_users_dict() {
    let (_dir, store) = fixture_store();
    // users_dict lists Jane Doe as the associate; the run is configured for Sam Roe.
    let generator = Arc::new(ScriptedGenerator::new([DRAFT, DRAFT, DRAFT, KEEP, KEEP]));
    let options = PipelineOptions {
        review: true,
        associate_name: Some("Sam Roe".to_string()),
    };
    let pipeline = generation_pipeline(&services(store, generator.clone()), &options).unwrap();
    let mut ctx = PipelineContext::new();

    pipeline.run(&mut ctx).await.unwrap();

    assert_eq!(ctx.stakeholders.as_ref().unwrap().0[0].name, "Jane Doe");
    let flagged: Vec<&str> = ctx
        .reviews
        .as_ref()
        .unwrap()
        .iter()
        .filter(|v| v.must_be_empty)
        .map(|v| v.card_heading.as_str())
        .collect();
    assert_eq!(flagged, vec!["Ownership"]);
    assert_eq!(generator.calls(), 5);
}
