use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Loop stage that can fall back to its local implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Structure,
    Draft,
    Snippet,
    Evaluate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Structure => write!(f, "structure"),
            Stage::Draft => write!(f, "draft"),
            Stage::Snippet => write!(f, "snippet"),
            Stage::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// Structured log events for the correction loop.
///
/// Iterations are 1-based. `run_id` tells concurrent runs apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    LoopStarted {
        run_id: String,
        repo_path: Option<PathBuf>,
        threshold: f64,
        max_attempts: usize,
        drafter: String,
        evaluator: String,
        runner: String,
    },
    ChangeStructured {
        run_id: String,
        files: usize,
        lines_added: usize,
        lines_removed: usize,
        synthetic: bool,
    },
    DraftStarted {
        run_id: String,
        iteration: usize,
        revision: bool,
    },
    DraftCompleted {
        run_id: String,
        iteration: usize,
        chars: usize,
        fallback: bool,
        duration_secs: f64,
    },
    SnippetsValidated {
        run_id: String,
        iteration: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
    EvaluationCompleted {
        run_id: String,
        iteration: usize,
        overall: f64,
        accuracy: f64,
        tone: f64,
        clarity: f64,
        source: String,
    },
    StageFallback {
        run_id: String,
        iteration: usize,
        stage: Stage,
        reason: String,
    },
    RetryScheduled {
        run_id: String,
        iteration: usize,
        overall: f64,
        threshold: f64,
        feedback_items: usize,
        failing_snippets: usize,
    },
    LoopAccepted {
        run_id: String,
        iterations: usize,
        overall: f64,
        duration_secs: f64,
    },
    LoopDegraded {
        run_id: String,
        iterations: usize,
        best_iteration: usize,
        overall: f64,
        duration_secs: f64,
    },
    LoopCancelled {
        run_id: String,
        iterations: usize,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }

    pub fn run_id(&self) -> &str {
        match self {
            LogEvent::LoopStarted { run_id, .. }
            | LogEvent::ChangeStructured { run_id, .. }
            | LogEvent::DraftStarted { run_id, .. }
            | LogEvent::DraftCompleted { run_id, .. }
            | LogEvent::SnippetsValidated { run_id, .. }
            | LogEvent::EvaluationCompleted { run_id, .. }
            | LogEvent::StageFallback { run_id, .. }
            | LogEvent::RetryScheduled { run_id, .. }
            | LogEvent::LoopAccepted { run_id, .. }
            | LogEvent::LoopDegraded { run_id, .. }
            | LogEvent::LoopCancelled { run_id, .. } => run_id,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for loop events - console output plus optional JSONL file
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// A logger that writes nowhere
    pub fn quiet() -> Self {
        Self {
            format: LogFormat::Compact,
            console: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    /// Keep file output but stop writing to stderr
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::LoopStarted {
                run_id,
                repo_path,
                threshold,
                max_attempts,
                drafter,
                evaluator,
                runner,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {}",
                    "docloops".bold().bright_white(),
                    short_id(run_id).dimmed()
                );
                if let Some(path) = repo_path {
                    let _ = writeln!(stderr, "  {} {}", "repo".dimmed(), path.display());
                }
                let _ = writeln!(
                    stderr,
                    "  {} {:.2}  {} {}",
                    "threshold".dimmed(),
                    threshold,
                    "attempts".dimmed(),
                    max_attempts
                );
                let _ = writeln!(
                    stderr,
                    "  {} {}  {} {}  {} {}",
                    "drafter".dimmed(),
                    drafter,
                    "evaluator".dimmed(),
                    evaluator,
                    "runner".dimmed(),
                    runner
                );
                let _ = writeln!(stderr);
            }
            LogEvent::ChangeStructured {
                files,
                lines_added,
                lines_removed,
                synthetic,
                ..
            } => {
                if *synthetic {
                    let _ = writeln!(
                        stderr,
                        "  {} {}",
                        "📁".dimmed(),
                        "Change could not be parsed, describing it as a whole".yellow()
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "  {} {} {}, {} {}",
                        "📁".dimmed(),
                        files,
                        if *files == 1 { "file" } else { "files" },
                        format!("+{}", lines_added).green(),
                        format!("-{}", lines_removed).red()
                    );
                }
                let _ = writeln!(stderr);
            }
            LogEvent::DraftStarted {
                iteration,
                revision,
                ..
            } => {
                let iter_text = format!("─ Attempt {} ", iteration);
                let padding = "─".repeat(60usize.saturating_sub(iter_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    iter_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let label = if *revision { "REVISE" } else { "DRAFT" };
                let _ = writeln!(stderr, "  {} {}", "▶".bright_cyan(), label.bright_cyan().bold());
            }
            LogEvent::DraftCompleted {
                chars,
                fallback,
                duration_secs,
                ..
            } => {
                let note = if *fallback { " (template)" } else { "" };
                let _ = writeln!(
                    stderr,
                    "    {} {} chars{} ({:.1}s)",
                    "✓".bright_green(),
                    chars,
                    note.yellow(),
                    duration_secs
                );
            }
            LogEvent::SnippetsValidated {
                total,
                succeeded,
                failed,
                skipped,
                ..
            } => {
                if *total == 0 {
                    let _ = writeln!(stderr, "    {}", "No code snippets".dimmed());
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} {} snippets: {} ok, {} failed, {} skipped",
                        "⚙".dimmed(),
                        total,
                        succeeded.to_string().green(),
                        if *failed > 0 {
                            failed.to_string().red()
                        } else {
                            failed.to_string().normal()
                        },
                        skipped.to_string().dimmed()
                    );
                }
            }
            LogEvent::EvaluationCompleted {
                overall,
                accuracy,
                tone,
                clarity,
                source,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {:.2} {}",
                    "▶".bright_magenta(),
                    "SCORE".bright_magenta().bold(),
                    overall,
                    format!(
                        "(accuracy {:.2}, tone {:.2}, clarity {:.2}, {})",
                        accuracy, tone, clarity, source
                    )
                    .dimmed()
                );
            }
            LogEvent::StageFallback { stage, reason, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} {} fell back to local: {}",
                    "⚠".bright_yellow(),
                    stage,
                    reason.yellow()
                );
            }
            LogEvent::RetryScheduled {
                overall,
                threshold,
                feedback_items,
                failing_snippets,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} {:.2} < {:.2}, retrying with {} feedback item(s), {} failing snippet(s)",
                    "→".bright_yellow(),
                    overall,
                    threshold,
                    feedback_items,
                    failing_snippets
                );
                let _ = writeln!(stderr, "{}", "└".bright_blue());
                let _ = writeln!(stderr);
            }
            LogEvent::LoopAccepted { .. } | LogEvent::LoopDegraded { .. } => {
                // Final outcome is printed by the caller
                let _ = writeln!(stderr, "{}", "└".bright_blue());
                let _ = writeln!(stderr);
            }
            LogEvent::LoopCancelled { iterations, .. } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Cancelled after {} attempt(s)",
                    "⚠".bright_yellow(),
                    iterations
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let id = short_id(event.run_id());
        let msg = match event {
            LogEvent::LoopStarted {
                threshold,
                max_attempts,
                ..
            } => format!("loop:start threshold={:.2} attempts={}", threshold, max_attempts),
            LogEvent::ChangeStructured {
                files, synthetic, ..
            } => format!("change:{}f synthetic={}", files, synthetic),
            LogEvent::DraftStarted { iteration, .. } => format!("draft:start:{}", iteration),
            LogEvent::DraftCompleted {
                iteration,
                chars,
                fallback,
                duration_secs,
                ..
            } => format!(
                "draft:done:{} chars={} fallback={} {:.1}s",
                iteration, chars, fallback, duration_secs
            ),
            LogEvent::SnippetsValidated {
                iteration,
                succeeded,
                failed,
                skipped,
                ..
            } => format!(
                "snippets:{} ok={} fail={} skip={}",
                iteration, succeeded, failed, skipped
            ),
            LogEvent::EvaluationCompleted {
                iteration,
                overall,
                source,
                ..
            } => format!("score:{} {:.2} {}", iteration, overall, source),
            LogEvent::StageFallback {
                iteration,
                stage,
                reason,
                ..
            } => format!("fallback:{}:{} {}", iteration, stage, reason),
            LogEvent::RetryScheduled {
                iteration, overall, ..
            } => format!("retry:{} {:.2}", iteration, overall),
            LogEvent::LoopAccepted {
                iterations,
                overall,
                duration_secs,
                ..
            } => format!(
                "loop:accepted:{} {:.2} {:.1}s",
                iterations, overall, duration_secs
            ),
            LogEvent::LoopDegraded {
                iterations,
                best_iteration,
                overall,
                duration_secs,
                ..
            } => format!(
                "loop:degraded:{} best={} {:.2} {:.1}s",
                iterations, best_iteration, overall, duration_secs
            ),
            LogEvent::LoopCancelled {
                iterations,
                duration_secs,
                ..
            } => format!("loop:cancelled:{} {:.1}s", iterations, duration_secs),
        };
        let _ = writeln!(stderr, "[{}] {} {}", timestamp, id, msg);
    }
}

fn short_id(run_id: &str) -> &str {
    run_id.get(..8).unwrap_or(run_id)
}
