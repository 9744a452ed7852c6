use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::{AgentConfig, AgentError, AgentOutput};

/// Utility for spawning agent processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process and capture its output, honouring `config.timeout`.
    ///
    /// The child is killed when the timeout elapses.
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        config: &AgentConfig,
    ) -> Result<AgentOutput, AgentError> {
        match config.timeout {
            Some(limit) => tokio::time::timeout(limit, Self::spawn_inner(binary, args, config))
                .await
                .map_err(|_| AgentError::Timeout(limit))?,
            None => Self::spawn_inner(binary, args, config).await,
        }
    }

    async fn spawn_inner(
        binary: &Path,
        args: &[&str],
        config: &AgentConfig,
    ) -> Result<AgentOutput, AgentError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            arg_count = args.len(),
            working_dir = %config.working_dir.display(),
            "Spawning agent process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AgentError::NotFound(binary.display().to_string()),
            _ => AgentError::SpawnFailed(e),
        })?;

        let stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::ExecutionFailed("stdout not captured".into()))?;
        let stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::ExecutionFailed("stderr not captured".into()))?;

        let mut stdout_reader = BufReader::new(stdout_handle).lines();
        let mut stderr_reader = BufReader::new(stderr_handle).lines();

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut stderr_open = true;

        // Read both streams concurrently so neither pipe fills up
        loop {
            tokio::select! {
                biased;

                result = stdout_reader.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stdout");
                            push_line(&mut stdout, &line);
                        }
                        Ok(None) => {
                            while let Ok(Some(line)) = stderr_reader.next_line().await {
                                trace!(line = %line, "stderr");
                                push_line(&mut stderr, &line);
                            }
                            break;
                        }
                        Err(e) => {
                            return Err(AgentError::ExecutionFailed(format!(
                                "Failed to read stdout: {}",
                                e
                            )));
                        }
                    }
                }
                result = stderr_reader.next_line(), if stderr_open => {
                    match result {
                        Ok(Some(line)) => {
                            trace!(line = %line, "stderr");
                            push_line(&mut stderr, &line);
                        }
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            return Err(AgentError::ExecutionFailed(format!(
                                "Failed to read stderr: {}",
                                e
                            )));
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        let duration = start.elapsed();

        debug!(
            exit_code = status.code().unwrap_or(-1),
            duration_ms = duration.as_millis(),
            "Agent process completed"
        );

        Ok(AgentOutput::new(
            stdout,
            stderr,
            status.code().unwrap_or(-1),
            duration,
        ))
    }
}

fn push_line(buffer: &mut String, line: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line);
}
