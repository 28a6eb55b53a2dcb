//! Running external programs under the run's cancellation token.

use std::process::Stdio;
use std::time::Duration;

use ocean_common::{PipelineError, PipelineResult};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tail of stderr kept for the error message.
const STDERR_TAIL: usize = 2048;

/// Spawn `argv` with `envs` and wait for it. A non-zero exit is a
/// `Collaborator` error carrying the end of stderr. The child is killed when
/// `timeout` elapses or `cancel` fires.
pub async fn run_command(
    name: &str,
    argv: &[String],
    envs: &[(String, String)],
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> PipelineResult<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| PipelineError::Config(format!("{} command is empty", name)))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!(collaborator = name, program = %program, "Spawning external command");
    let mut child = cmd
        .spawn()
        .map_err(|e| PipelineError::collaborator(name, format!("Failed to spawn {}: {}", program, e)))?;

    let mut stderr = child.stderr.take();
    let collect_stderr = async move {
        let mut buf = Vec::new();
        if let Some(stderr) = stderr.as_mut() {
            stderr.read_to_end(&mut buf).await.ok();
        }
        buf
    };

    let deadline = async {
        match timeout {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };

    let (status, stderr) = tokio::select! {
        result = async { tokio::join!(child.wait(), collect_stderr) } => result,
        _ = cancel.cancelled() => {
            warn!(collaborator = name, "Run cancelled, killing external command");
            child.kill().await.ok();
            return Err(PipelineError::Cancelled);
        }
        _ = deadline => {
            let after = timeout.unwrap_or_default();
            warn!(collaborator = name, after_secs = after.as_secs(), "External command timed out, killing");
            child.kill().await.ok();
            return Err(PipelineError::Timeout { stage: name.to_string(), after });
        }
    };

    let status = status?;
    if status.success() {
        debug!(collaborator = name, "External command finished");
        return Ok(());
    }

    let text = String::from_utf8_lossy(&stderr);
    let tail = tail_chars(text.trim_end(), STDERR_TAIL);
    Err(PipelineError::collaborator(
        name,
        format!("{} exited with {}: {}", program, status, tail),
    ))
}

fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = text.char_indices().nth(count - max).map_or(0, |(i, _)| i);
    &text[skip..]
}
