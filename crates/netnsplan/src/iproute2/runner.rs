//! Subprocess execution.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Captured output of a finished command.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// [`Error::Command`] for a failed run: the exit status and the trimmed
    /// stderr.
    pub fn into_error(self) -> Error {
        Error::Command {
            status: self.status.unwrap_or(-1),
            message: trim_message(&self.stderr),
        }
    }
}

/// Run `program args...`, optionally feeding `input` on stdin.
///
/// A nonzero exit becomes [`Error::Command`]. Failing to spawn or talk to the
/// process is [`Error::Io`].
pub(crate) async fn run(program: &Path, args: &[&str], input: Option<&str>) -> Result<CommandOutput> {
    let out = capture(program, args, input).await?;
    if !out.success() {
        return Err(out.into_error());
    }
    Ok(out)
}

/// Like [`run`], but a nonzero exit is returned as output rather than an
/// error.
pub(crate) async fn capture(
    program: &Path,
    args: &[&str],
    input: Option<&str>,
) -> Result<CommandOutput> {
    tracing::debug!(cmd = %program.display(), args = ?args, "exec");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdin = child.stdin.take();
    let write = async {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            stdin.write_all(input.as_bytes()).await?;
            // dropping stdin closes the pipe so the child sees EOF
        }
        Ok::<_, std::io::Error>(())
    };

    let (written, output) = tokio::join!(write, child.wait_with_output());
    let output = output?;
    written?;

    Ok(CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Strip the trailing newline and the `Error: ` prefix iproute2 adds.
pub(crate) fn trim_message(stderr: &str) -> String {
    let msg = stderr.trim_end_matches('\n');
    msg.strip_prefix("Error: ").unwrap_or(msg).to_string()
}

/// Classify a failed `ip` invocation by its message.
///
/// iproute2 has no machine-readable error output, so this is the one place
/// where messages are inspected. Everything above the transport matches on
/// the resulting variant.
pub(crate) fn classify(err: Error) -> Error {
    match err {
        Error::Command { status, message } => {
            if message.contains("Operation not permitted") {
                Error::PermissionDenied { message }
            } else if message.contains("does not exist")
                || message.contains("Cannot find device")
                || message.contains("No such file or directory")
            {
                Error::NotFound { message }
            } else {
                Error::Command { status, message }
            }
        }
        other => other,
    }
}
