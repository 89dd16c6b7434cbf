//! Appraisal CLI: wiring of configuration, collaborators and pipelines
pub mod config;

pub use config::AppConfig;

use anyhow::{Context, Result};
use appraisal_core::{CancellationToken, PipelineContext, RunReport};
use appraisal_llm::OpenAiCompatibleGenerator;
use appraisal_prompts::PromptBook;
use appraisal_stages::{generation_pipeline, review_pipeline, PipelineOptions, Services};
use appraisal_store::YamlStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Drafts and reviews appraisal comments from the record files in the store.
#[derive(Parser, Debug)]
#[command(name = "appraisal", version, about = "Draft and review appraisal comments")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file; falls back to $APPRAISAL_CONFIG.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Forces the review stage on inside `generate`.
    #[arg(long, global = true)]
    pub review: bool,
}

impl Args {
    /// The subcommand to run; `generate` when none was given.
    pub fn selected(&self) -> Command {
        self.command.unwrap_or(Command::Generate)
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Draft comments for every card and write them out.
    Generate,
    /// Review a previously written final comments file.
    Review,
}

/// Builds the store, generator and prompt book described by `config`.
pub fn services(config: &AppConfig) -> Result<Services> {
    let store = Arc::new(YamlStore::new(config.store.root.clone()));
    let generator = Arc::new(
        OpenAiCompatibleGenerator::new(config.generator.clone())
            .context("failed to build the generator client")?,
    );
    let prompts = match &config.prompts_path {
        Some(path) => PromptBook::load(path)
            .with_context(|| format!("failed to load prompts from {}", path.display()))?,
        None => PromptBook::bundled().context("bundled prompts are invalid")?,
    };
    Ok(Services::new(store, generator, Arc::new(prompts)))
}

/// Runs `command` to completion or until `cancel` fires.
pub async fn run(
    command: Command,
    config: &AppConfig,
    services: &Services,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let options = PipelineOptions {
        review: config.review.enabled,
        associate_name: config.review.associate_name.clone(),
    };
    let pipeline = match command {
        Command::Generate => generation_pipeline(services, &options),
        Command::Review => review_pipeline(services, &options),
    }
    .context("invalid pipeline")?;

    info!(
        pipeline = pipeline.pipeline_id(),
        store = %config.store.root.display(),
        model = %config.generator.model,
        "starting"
    );

    let mut ctx = PipelineContext::new();
    let run_id = ctx.run_id.clone();
    pipeline
        .run_until_cancelled(&mut ctx, cancel)
        .await
        .with_context(|| format!("run {} failed", run_id))
}
