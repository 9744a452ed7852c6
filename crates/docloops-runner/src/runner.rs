use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::{CodeSnippet, ExecutionResult};

/// Executes a snippet in isolation.
///
/// Infallible by contract: anything that prevents execution is reported
/// as a skipped result, only code that ran and failed is a failure.
#[async_trait]
pub trait SnippetRunner: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, snippet: &CodeSnippet) -> ExecutionResult;
}

/// Variables a snippet inherits from the caller; everything else is cleared
const PASSTHROUGH_ENV: &[&str] = &["PATH", "LANG"];

/// How to run one language: a program and the file name the snippet is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: String,
    pub file_name: String,
}

impl Interpreter {
    pub fn new(program: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            file_name: file_name.into(),
        }
    }
}

/// Runs snippets with locally installed interpreters, each in a fresh
/// scratch directory that is removed afterwards. The snippet sees only
/// `PATH` and `LANG` from the caller's environment; `HOME` and `TMPDIR`
/// point at the scratch directory.
pub struct LocalRunner {
    interpreters: HashMap<String, Interpreter>,
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRunner {
    /// Runner with the default interpreter table
    pub fn new() -> Self {
        let python = Interpreter::new("python3", "snippet.py");
        let node = Interpreter::new("node", "snippet.js");
        let bash = Interpreter::new("bash", "snippet.sh");
        let ruby = Interpreter::new("ruby", "snippet.rb");

        Self::empty()
            .with_interpreter("python", python.clone())
            .with_interpreter("py", python)
            .with_interpreter("javascript", node.clone())
            .with_interpreter("js", node)
            .with_interpreter("bash", bash.clone())
            .with_interpreter("sh", bash.clone())
            .with_interpreter("shell", bash)
            .with_interpreter("ruby", ruby)
    }

    /// Runner that supports no languages
    pub fn empty() -> Self {
        Self {
            interpreters: HashMap::new(),
        }
    }

    pub fn with_interpreter(mut self, language: &str, interpreter: Interpreter) -> Self {
        self.interpreters
            .insert(language.to_lowercase(), interpreter);
        self
    }

    pub fn supports(&self, language: &str) -> bool {
        self.interpreters.contains_key(&language.to_lowercase())
    }

    async fn execute(
        &self,
        snippet: &CodeSnippet,
        interpreter: &Interpreter,
    ) -> std::io::Result<std::process::Output> {
        let scratch = tempfile::TempDir::new()?;
        let script = scratch.path().join(&interpreter.file_name);
        tokio::fs::write(&script, &snippet.source).await?;

        let mut cmd = Command::new(&interpreter.program);
        cmd.arg(&script)
            .current_dir(scratch.path())
            .env_clear()
            .env("HOME", scratch.path())
            .env("TMPDIR", scratch.path());
        for key in PASSTHROUGH_ENV {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
    }
}

#[async_trait]
impl SnippetRunner for LocalRunner {
    fn name(&self) -> &str {
        "local"
    }

    async fn run(&self, snippet: &CodeSnippet) -> ExecutionResult {
        let Some(interpreter) = self.interpreters.get(&snippet.language.to_lowercase()) else {
            debug!(language = %snippet.language, origin = %snippet.origin, "Unsupported snippet language");
            return ExecutionResult::skipped(
                snippet,
                format!("unsupported language: {}", snippet.language),
            );
        };

        match self.execute(snippet, interpreter).await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                debug!(
                    origin = %snippet.origin,
                    exit_code = output.status.code().unwrap_or(-1),
                    "Snippet executed"
                );

                if output.status.success() {
                    ExecutionResult::success(snippet, stdout)
                } else {
                    let error = if stderr.trim().is_empty() {
                        match output.status.code() {
                            Some(code) if stdout.trim().is_empty() => {
                                format!("exited with code {}", code)
                            }
                            None if stdout.trim().is_empty() => "terminated by signal".to_string(),
                            _ => stdout.clone(),
                        }
                    } else {
                        stderr
                    };
                    ExecutionResult::failure(snippet, stdout, error)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ExecutionResult::skipped(
                snippet,
                format!("interpreter not available: {}", interpreter.program),
            ),
            Err(e) => {
                ExecutionResult::skipped(snippet, format!("execution backend error: {}", e))
            }
        }
    }
}
