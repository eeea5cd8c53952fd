//! Ingestion progress reporting for `nlq ingest`.
//!
//! The CLI polls the job tracker and forwards each change to a reporter.
//! Progress goes to **stderr** so the summary on stdout stays parseable.

use std::io::Write;

use crate::models::IngestJob;

/// Reports ingestion progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    /// Emit the current state of a job.
    fn report(&self, job: &IngestJob);
}

/// Human-friendly progress on stderr: "ingest 1a2b…  12 / 1,000 documents".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, job: &IngestJob) {
        let mut line = format!(
            "ingest {}  {} / {} documents",
            short_id(&job.id),
            format_number(job.processed as u64),
            format_number(job.total as u64)
        );
        if job.failed > 0 {
            line.push_str(&format!("  ({} failed)", format_number(job.failed as u64)));
        }
        if job.done {
            line.push_str("  done");
        }
        line.push('\n');
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, job: &IngestJob) {
        let obj = serde_json::json!({
            "event": "progress",
            "job_id": job.id,
            "processed": job.processed,
            "total": job.total,
            "failed": job.failed,
            "done": job.done,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _job: &IngestJob) {}
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
