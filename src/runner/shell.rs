//! Shell subprocess runner - executes stage commands through `sh -c`

use crate::runner::{
    CommandOutput, CommandRunner, Invocation, OutputLine, OutputSink, OutputStream, RunnerConfig,
    RunnerError,
};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs commands as shell subprocesses
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    config: RunnerConfig,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn build_command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.config.shell);
        command
            .args(&self.config.shell_args)
            .arg(&invocation.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for key in &invocation.env_remove {
            command.env_remove(key);
        }
        command.envs(&invocation.env);

        if let Some(dir) = invocation
            .working_dir
            .as_ref()
            .or(self.config.working_dir.as_ref())
        {
            command.current_dir(dir);
        }

        command
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    /// Spawn the command and collect its output
    ///
    /// # Errors
    /// Returns `RunnerError` if:
    /// - The shell cannot be spawned
    /// - Waiting on the child fails
    /// - The invocation's timeout expires (the child is killed)
    ///
    /// A non-zero exit is not an error here; callers inspect `exit_code`.
    async fn run(
        &self,
        invocation: &Invocation,
        sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning `{}`", invocation.command);

        let mut child = self
            .build_command(invocation)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                command: invocation.command.clone(),
                source,
            })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        let collect = async {
            let mut lines = Vec::new();
            while let Some(line) = rx.recv().await {
                if let Some(sink) = sink {
                    sink.on_line(&line);
                }
                lines.push(line);
            }
            let status = child.wait().await?;
            Ok::<CommandOutput, std::io::Error>(CommandOutput::new(status.code(), lines))
        };

        let output = match invocation.timeout {
            Some(limit) => {
                let result = timeout(limit, collect).await;
                match result {
                    Ok(output) => output?,
                    Err(_) => {
                        warn!(
                            "`{}` timed out after {}s, killing it",
                            invocation.command,
                            limit.as_secs()
                        );
                        if let Err(e) = child.start_kill() {
                            warn!("Failed to kill timed out command: {}", e);
                        }
                        return Err(RunnerError::Timeout(limit.as_secs()));
                    }
                }
            }
            None => collect.await?,
        };

        debug!(
            "`{}` exited with {:?} after {} lines of output",
            invocation.command,
            output.exit_code,
            output.lines.len()
        );

        Ok(output)
    }
}

/// Read a pipe line by line, tolerating non-UTF-8 output
async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                if tx.send(OutputLine { stream, text }).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Stopped reading {:?}: {}", stream, e);
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Collector {
        lines: Arc<Mutex<Vec<OutputLine>>>,
    }

    impl OutputSink for Collector {
        fn on_line(&self, line: &OutputLine) {
            self.lines.lock().unwrap().push(line.clone());
        }
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let runner = ShellRunner::default();
        let collector = Collector::default();

        let output = runner
            .run(
                &Invocation::new("echo built; echo 'warning: unused' >&2"),
                Some(&collector),
            )
            .await
            .unwrap();

        assert!(output.success());
        assert!(output.lines.contains(&OutputLine::stdout("built")));
        assert!(output.lines.contains(&OutputLine::stderr("warning: unused")));
        assert_eq!(collector.lines.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        let runner = ShellRunner::default();
        let output = runner.run(&Invocation::new("exit 101"), None).await.unwrap();
        assert_eq!(output.exit_code, Some(101));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let runner = ShellRunner::default();
        let invocation =
            Invocation::new("sleep 5").with_timeout(Duration::from_millis(200));

        let result = runner.run(&invocation, None).await;
        assert!(matches!(result, Err(RunnerError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_shell_fails_to_spawn() {
        let runner = ShellRunner::new(
            RunnerConfig::new().with_shell("nonexistent-shell-binary", vec!["-c".to_string()]),
        );
        let result = runner.run(&Invocation::new("true"), None).await;
        assert!(matches!(result, Err(RunnerError::Spawn { .. })));
    }
}
