mod config;

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;

use docloops_agent::{create_agent, Agent, AgentConfig, AgentType, ThrottledAgent};
use docloops_changes::{DiffCapture, DiffStructurer};
use docloops_core::{CancelHandle, CorrectionLoop, LoopConfig, LoopOutcome, RunInput, Stages};
use docloops_critic::AgentEvaluator;
use docloops_drafter::AgentDrafter;
use docloops_logging::{init_tracing, LogFormat, Logger};
use docloops_runner::LocalRunner;

use config::{FileConfig, RunnerChoice, DEFAULT_BASE};

/// Exit code for usage, config and IO errors
const ERROR_EXIT_CODE: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "docloops",
    about = "Self-correcting documentation generator for code changes",
    version,
    author
)]
struct Cli {
    /// Raw change text (a unified diff)
    #[arg(long, conflicts_with = "diff_file")]
    diff: Option<String>,

    /// Read the change from a file, or from stdin with `-`
    #[arg(long)]
    diff_file: Option<PathBuf>,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Ref to diff against when the working tree is clean [default: main]
    #[arg(long, env = "GIT_BRANCH")]
    base: Option<String>,

    /// Agent to use for both drafting and evaluation [default: claude]
    #[arg(short, long, value_enum)]
    agent: Option<AgentChoice>,

    /// Agent to use specifically for drafting
    #[arg(long, value_enum)]
    drafter_agent: Option<AgentChoice>,

    /// Agent to use specifically for evaluation
    #[arg(long, value_enum)]
    evaluator_agent: Option<AgentChoice>,

    /// Model to use (if agent supports it)
    #[arg(short, long)]
    model: Option<String>,

    /// Minimum overall quality score for acceptance (0.0 - 1.0)
    #[arg(short, long, env = "MIN_DOC_QUALITY_SCORE")]
    threshold: Option<f64>,

    /// Maximum number of drafts
    #[arg(short = 'n', long, env = "MAX_SELF_CORRECTION_ATTEMPTS")]
    max_attempts: Option<usize>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Append loop events as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Show debug diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Write the final documentation to this file, or to the suggested
    /// doc path under the working directory when no file is given
    #[arg(short, long, num_args = 0..=1)]
    output: Option<Option<PathBuf>>,

    /// Never execute code snippets found in drafts
    #[arg(long)]
    no_exec: bool,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AgentChoice {
    #[value(alias = "claude-code")]
    Claude,
    Opencode,
    /// Local fallback stages only
    #[value(name = "none")]
    Local,
}

impl AgentChoice {
    fn agent_type(self) -> Option<AgentType> {
        match self {
            AgentChoice::Claude => Some(AgentType::ClaudeCode),
            AgentChoice::Opencode => Some(AgentType::OpenCode),
            AgentChoice::Local => None,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(value, true)
            .map_err(|e| anyhow!("Invalid agent '{}' in config: {}", value, e))
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Agent and model chosen for one role
#[derive(Debug, Clone)]
struct RoleSetup {
    choice: AgentChoice,
    model: Option<String>,
}

impl RoleSetup {
    /// Priority: role flag > --agent > role config > config agent > claude
    fn resolve(
        role_flag: Option<AgentChoice>,
        cli: &Cli,
        config_agent: Option<&str>,
        config_model: Option<&str>,
    ) -> Result<Self> {
        let choice = match role_flag.or(cli.agent) {
            Some(choice) => choice,
            None => config_agent
                .map(AgentChoice::parse)
                .transpose()?
                .unwrap_or(AgentChoice::Claude),
        };
        let model = cli.model.clone().or(config_model.map(String::from));
        Ok(Self { choice, model })
    }

    fn describe(&self) -> String {
        let agent = match self.choice.agent_type() {
            Some(agent_type) => agent_type.to_string(),
            None => "local".to_string(),
        };
        match &self.model {
            Some(model) if self.choice != AgentChoice::Local => format!("{} ({})", agent, model),
            _ => agent,
        }
    }
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ERROR_EXIT_CODE
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(if cli.verbose { "debug" } else { "error" }, log_format);

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Project settings win over user settings
    let project = FileConfig::load_project(&working_dir)?;
    let user = match FileConfig::user_config_path() {
        Some(path) => FileConfig::load(&path)?,
        None => None,
    };
    let file_config = project.unwrap_or_default().or(user.unwrap_or_default());

    let loop_config = file_config.loop_config(cli.threshold, cli.max_attempts);
    loop_config.validate()?;

    let concurrency = file_config.agent_concurrency();
    anyhow::ensure!(concurrency > 0, "agent_concurrency must be at least 1");

    let drafter_setup = RoleSetup::resolve(
        cli.drafter_agent,
        &cli,
        file_config.drafter_agent(),
        file_config.drafter_model(),
    )?;
    let evaluator_setup = RoleSetup::resolve(
        cli.evaluator_agent,
        &cli,
        file_config.evaluator_agent(),
        file_config.evaluator_model(),
    )?;

    let runner = if cli.no_exec {
        RunnerChoice::Disabled
    } else {
        file_config.runner()
    };

    let base = file_config.base(cli.base.as_deref());
    let raw_change = read_change(&cli, &working_dir, base)?;

    if cli.dry_run {
        print_dry_run(
            &raw_change,
            &working_dir,
            &drafter_setup,
            &evaluator_setup,
            runner,
            &loop_config,
        );
        return Ok(0);
    }

    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    // Roles that pick the same agent share one throttled instance
    let mut pool: HashMap<AgentType, Option<Arc<dyn Agent>>> = HashMap::new();
    let mut stages = Stages::local();
    if runner == RunnerChoice::Disabled {
        stages = stages.with_runner(Arc::new(LocalRunner::empty()));
    }

    if let Some(agent) = connect(&drafter_setup, "drafter", concurrency, &mut pool).await {
        let config = agent_config(&working_dir, &drafter_setup)
            .with_timeout(loop_config.timeouts.draft);
        stages = stages.with_drafter(Arc::new(AgentDrafter::new(agent, config)));
    }
    if let Some(agent) = connect(&evaluator_setup, "evaluator", concurrency, &mut pool).await {
        let config = agent_config(&working_dir, &evaluator_setup)
            .with_timeout(loop_config.timeouts.evaluate);
        stages = stages.with_evaluator(Arc::new(AgentEvaluator::new(agent, config)));
    }

    let correction_loop = CorrectionLoop::new(stages, loop_config, Arc::new(logger))?;

    // Handle Ctrl+C gracefully
    let cancel = CancelHandle::new();
    let interrupt_handle = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Stopping before the next iteration...");
        interrupt_handle.cancel();
    })
    .context("Failed to set Ctrl+C handler")?;

    let input = RunInput::new(raw_change)
        .with_repo_path(working_dir.clone())
        .with_cancel(cancel);
    let outcome = correction_loop.run(input).await;

    if let (Some(target), Some(content), Some(doc_path)) =
        (&cli.output, outcome.content(), outcome.doc_path())
    {
        let path = match target {
            Some(path) => path.clone(),
            None => working_dir.join(doc_path),
        };
        write_output(&path, content)?;
    }

    if cli.json_output {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
        if cli.output.is_none() {
            if let Some(content) = outcome.content() {
                println!("{}", content);
            }
        }
    }

    Ok(outcome.exit_code())
}

/// Change text from --diff, --diff-file, or git.
///
/// A clean working tree falls back to the diff against `base`. A missing
/// default base only warns; a base that was asked for must resolve.
fn read_change(cli: &Cli, working_dir: &Path, base: Option<&str>) -> Result<String> {
    if let Some(ref diff) = cli.diff {
        return Ok(diff.clone());
    }

    if let Some(ref path) = cli.diff_file {
        if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read change from stdin")?;
            return Ok(buf);
        }
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read diff file {}", path.display()));
    }

    let capture = DiffCapture::new();
    let diff = capture
        .capture_diff(working_dir)
        .with_context(|| format!("Failed to capture git diff in {}", working_dir.display()))?;
    if !diff.trim().is_empty() {
        return Ok(diff);
    }

    let result = capture.capture_diff_against(working_dir, base.unwrap_or(DEFAULT_BASE));
    let against = match (base, result) {
        (_, Ok(against)) => against,
        (Some(base), Err(e)) => {
            return Err(e).with_context(|| format!("Failed to diff against base '{}'", base));
        }
        (None, Err(e)) => {
            tracing::warn!(base = DEFAULT_BASE, error = %e, "Default base not found");
            String::new()
        }
    };
    if against.trim().is_empty() {
        tracing::warn!(dir = %working_dir.display(), "Working tree has no changes");
    }
    Ok(against)
}

/// Build the shared agent for a role, or `None` when the role runs locally
async fn connect(
    setup: &RoleSetup,
    role: &str,
    concurrency: usize,
    pool: &mut HashMap<AgentType, Option<Arc<dyn Agent>>>,
) -> Option<Arc<dyn Agent>> {
    let agent_type = setup.choice.agent_type()?;

    let agent = match pool.get(&agent_type) {
        Some(agent) => agent.clone(),
        None => {
            let agent: Arc<dyn Agent> =
                Arc::new(ThrottledAgent::new(create_agent(agent_type), concurrency));
            let agent = agent.is_available().await.then_some(agent);
            pool.insert(agent_type, agent.clone());
            agent
        }
    };

    if agent.is_none() {
        eprintln!(
            "{} agent '{}' is not available, {} will use the local fallback. \
             Make sure it's installed and in PATH.",
            "warning:".yellow().bold(),
            agent_type,
            role
        );
    }
    agent
}

fn agent_config(working_dir: &Path, setup: &RoleSetup) -> AgentConfig {
    let config = AgentConfig::new(working_dir.to_path_buf());
    match &setup.model {
        Some(model) => config.with_model(model.clone()),
        None => config,
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write documentation to {}", path.display()))
}

fn print_dry_run(
    raw_change: &str,
    working_dir: &Path,
    drafter: &RoleSetup,
    evaluator: &RoleSetup,
    runner: RunnerChoice,
    config: &LoopConfig,
) {
    let change = DiffStructurer::parse(raw_change);

    println!("=== Dry Run ===");
    println!("Working dir: {}", working_dir.display());
    println!(
        "Change: {} file(s), +{} / -{}{}",
        change.len(),
        change.total_lines_added(),
        change.total_lines_removed(),
        if change.synthetic { " (unparsed)" } else { "" }
    );
    for path in change.paths() {
        println!("  {}", path);
    }
    println!("Suggested doc path: {}", change.suggested_doc_path());
    println!("Drafter: {}", drafter.describe());
    println!("Evaluator: {}", evaluator.describe());
    println!(
        "Snippets: {}",
        match runner {
            RunnerChoice::Local => "local",
            RunnerChoice::Disabled => "disabled",
        }
    );
    println!("Threshold: {:.2}", config.threshold);
    println!("Max attempts: {}", config.max_attempts);
    println!(
        "Timeouts: structure {:?}, draft {:?}, snippet {:?}, evaluate {:?}",
        config.timeouts.structure,
        config.timeouts.draft,
        config.timeouts.snippet,
        config.timeouts.evaluate
    );
}

fn print_outcome(outcome: &LoopOutcome) {
    match outcome {
        LoopOutcome::Accepted {
            score,
            iterations,
            fallback,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("{}", "=== ACCEPTED ===".green().bold());
            eprintln!("Iterations: {}", iterations);
            eprintln!("Score: {}", score.short_description());
            eprintln!("Duration: {:.1}s", total_duration_secs);
            if *fallback {
                eprintln!("Drafted by the local template.");
            }
        }
        LoopOutcome::Degraded {
            score,
            iterations,
            best_iteration,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("{}", "=== DEGRADED ===".yellow().bold());
            eprintln!("No draft met the threshold after {} iteration(s)", iterations);
            eprintln!("Best draft: iteration {}", best_iteration);
            eprintln!("Score: {}", score.short_description());
            eprintln!("Duration: {:.1}s", total_duration_secs);
            for item in &score.feedback {
                eprintln!("  - {}", item);
            }
        }
        LoopOutcome::Cancelled {
            iterations,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("{}", "=== CANCELLED ===".red().bold());
            eprintln!("Stopped after {} iteration(s)", iterations);
            eprintln!("Duration: {:.1}s", total_duration_secs);
        }
    }
}
