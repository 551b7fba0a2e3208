mod cli;
mod ui;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use verdict::{Dispatcher, Job, JobId, SubmitRequest, VerdictConfig, classifier};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEMO_TEXT: &str = "Breaking news: celebrity scandal";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            VerdictConfig::load_from(path)?
        }
        None => VerdictConfig::load()?,
    };
    cli.apply(&mut config);

    let classifier = classifier::load(config.model_path.as_deref());
    let (dispatcher, pool) = Dispatcher::start(&config, classifier)?;

    let outcome = tokio::select! {
        result = run(&dispatcher, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, stopping");
            Ok(())
        }
    };

    pool.shutdown().await;
    outcome
}

async fn run(dispatcher: &Dispatcher, command: Command) -> Result<()> {
    match command {
        Command::Classify { texts } => {
            let ids = submit_all(dispatcher, texts).await?;
            for job in await_jobs(dispatcher, &ids).await? {
                ui::print_job_json(&job);
            }
        }
        Command::Batch { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let texts: Vec<String> = contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect();
            if texts.is_empty() {
                bail!("{} contains no texts", file.display());
            }
            let ids = submit_all(dispatcher, texts).await?;
            for job in await_jobs(dispatcher, &ids).await? {
                ui::print_job(&job);
            }
            ui::print_stats(&dispatcher.stats());
        }
        Command::Demo => demo(dispatcher).await?,
    }
    Ok(())
}

async fn submit_all(dispatcher: &Dispatcher, texts: Vec<String>) -> Result<Vec<JobId>> {
    let mut ids = Vec::with_capacity(texts.len());
    for text in texts {
        let id = dispatcher
            .submit(SubmitRequest::new(text))
            .await
            .context("submission rejected")?;
        ids.push(id);
    }
    Ok(ids)
}

/// Poll until every job in `ids` is terminal.
async fn await_jobs(dispatcher: &Dispatcher, ids: &[JobId]) -> Result<Vec<Job>> {
    let progress = ui::BatchProgress::start(ids.len());
    loop {
        let jobs = ids
            .iter()
            .map(|id| dispatcher.get_job(&id.to_string()))
            .collect::<verdict::Result<Vec<_>>>()?;
        let finished = jobs.iter().filter(|job| job.is_terminal()).count();
        progress.update(finished);
        if finished == jobs.len() {
            progress.finish();
            return Ok(jobs);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn demo(dispatcher: &Dispatcher) -> Result<()> {
    println!("Submitting {DEMO_TEXT:?}");
    let id = dispatcher.submit(SubmitRequest::new(DEMO_TEXT)).await?;
    println!("  accepted as job {id}");
    for job in await_jobs(dispatcher, &[id]).await? {
        ui::print_job_json(&job);
    }

    println!();
    println!("Submitting an empty text");
    let before = dispatcher.list_jobs().len();
    match dispatcher.submit(SubmitRequest::new("")).await {
        Ok(id) => println!("  unexpectedly accepted as job {id}"),
        Err(e) => println!("  rejected: {e}"),
    }
    println!("  jobs before: {before}, after: {}", dispatcher.list_jobs().len());

    println!();
    println!("Looking up job \"nonexistent\"");
    match dispatcher.get_job("nonexistent") {
        Ok(job) => println!("  unexpectedly found job {}", job.id),
        Err(e) => println!("  {e}"),
    }

    ui::print_stats(&dispatcher.stats());
    Ok(())
}
