//! Engine binary entry point
//!
//! Runs one pipeline invocation from the command line: load a spec file,
//! generate and execute scenarios against a target base URL, print the
//! run report as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use uuid::Uuid;

use engine::services::{
    CompletionConfig, HttpCompletionClient, HttpTargetClient, InMemoryResultStore,
    InMemorySpecStore,
};
use engine::Pipeline;
use shared::{
    ExecutionConfig, GenerationOptions, ProtocolKind, RunStatus, Strictness, TargetConfig,
    ValidationConfig,
};

#[derive(Clone, Copy, ValueEnum)]
enum SpecKind {
    Rest,
    Soap,
}

#[derive(Parser)]
#[command(name = "engine")]
#[command(about = "Generate and execute LLM-derived API tests against a live target")]
struct Args {
    /// Specification file (OpenAPI JSON or WSDL)
    spec: PathBuf,

    /// Specification kind
    #[arg(long, value_enum)]
    kind: SpecKind,

    /// Base URL of the system under test
    #[arg(long)]
    target: String,

    /// Extra header sent with every target request, as `name: value`
    #[arg(long = "header")]
    headers: Vec<String>,

    /// Scenarios requested per operation
    #[arg(long, default_value_t = 3)]
    limit: u32,

    /// Completion model name
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Completion endpoint base URL override
    #[arg(long)]
    completion_url: Option<String>,

    /// Worker pool size for target calls
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Retry budget per scenario
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Per-scenario timeout in seconds
    #[arg(long, default_value_t = 10)]
    scenario_timeout: u64,

    /// Overall run deadline in seconds
    #[arg(long, default_value_t = 120)]
    deadline: u64,

    /// Flag unexpected response fields instead of ignoring them
    #[arg(long)]
    strict: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    shared::logging::init_tracing_with_level(args.log_level.as_deref());

    let api_key = std::env::var("OPENAI_API_KEY")
        .context("OPENAI_API_KEY must be set for the completion service")?;

    let raw = std::fs::read(&args.spec)
        .with_context(|| format!("failed to read {}", args.spec.display()))?;

    let mut target = TargetConfig::new(args.target.clone());
    for header in &args.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header `{header}` (expected `name: value`)");
        };
        target = target.with_header(name.trim(), value.trim());
    }

    let mut completion_config = CompletionConfig::new(api_key);
    if let Some(url) = &args.completion_url {
        completion_config = completion_config.with_base_url(url.clone());
    }

    let generation = GenerationOptions {
        per_operation_limit: args.limit,
        model: args.model.clone(),
        ..Default::default()
    };
    let execution = ExecutionConfig {
        worker_pool: args.workers,
        max_retries: args.retries,
        scenario_timeout: Duration::from_secs(args.scenario_timeout),
        run_deadline: Duration::from_secs(args.deadline),
        ..Default::default()
    };
    let validation = ValidationConfig {
        strictness: if args.strict {
            Strictness::Strict
        } else {
            Strictness::Lenient
        },
    };

    let pipeline = Pipeline::new(
        Arc::new(HttpCompletionClient::new(completion_config)?),
        Arc::new(HttpTargetClient::new()),
        Arc::new(InMemoryResultStore::new()),
        Arc::new(InMemorySpecStore::new()),
        generation,
        execution,
        validation,
    )?;

    let kind = match args.kind {
        SpecKind::Rest => ProtocolKind::Rest,
        SpecKind::Soap => ProtocolKind::Soap,
    };
    let run_id = Uuid::new_v4();
    let report = pipeline.run_raw(run_id, &raw, kind, target).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    match report.status {
        RunStatus::Passed => Ok(()),
        _ => std::process::exit(1),
    }
}
