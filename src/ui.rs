//! Interface de terminal do verdict: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use verdict::{Job, JobState, JobStats};

/// Acompanha quantos jobs submetidos já chegaram a um estado terminal.
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("classifying");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn update(&self, finished: usize) {
        self.pb.set_position(finished as u64);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

fn state_style(state: JobState) -> Style {
    match state {
        JobState::Done => Style::new().green().bold(),
        JobState::Failed => Style::new().red().bold(),
        JobState::Running => Style::new().yellow(),
        JobState::Pending => Style::new().dim(),
    }
}

/// Resumo de uma linha: id, estado e veredito ou erro.
pub fn summary(job: &Job) -> String {
    let outcome = match (&job.result, &job.error) {
        (Some(verdict), _) => format!("{} ({:.2})", verdict.label, verdict.confidence),
        (None, Some(error)) => error.clone(),
        (None, None) => String::new(),
    };
    format!(
        "#{:<4} {:<8} {}",
        job.id.to_string(),
        job.state.to_string(),
        outcome
    )
}

pub fn print_job(job: &Job) {
    let marker = match job.state {
        JobState::Done => "✓",
        JobState::Failed => "✗",
        _ => "…",
    };
    println!("  {} {}", state_style(job.state).apply_to(marker), summary(job));
}

pub fn print_job_json(job: &Job) {
    println!("{}", serde_json::to_string_pretty(job).unwrap_or_default());
}

pub fn print_stats(stats: &JobStats) {
    let heading = Style::new().bold();
    println!();
    println!("{}", heading.apply_to("─── Stats ───"));
    println!(
        "Total: {} | Pending: {} | Running: {} | Done: {} | Failed: {} | Queued: {} | Workers: {}",
        stats.total,
        stats.pending,
        stats.running,
        stats.done,
        stats.failed,
        stats.queued,
        stats.workers
    );
}
