//! Cancellable asynchronous command execution
//!
//! Every long-running launcher action (uploading an assembly, launching or
//! stopping a deployment) runs an external tool. A [`CommandTask`] wraps one
//! such invocation: the child process runs on a worker task while the caller
//! keeps polling a non-blocking result slot from its tick loop. The task
//! carries an immutable snapshot of the configuration that produced it, so
//! a result can be correlated with that configuration even after the live
//! config has been edited.

use log::debug;
use shared::pending::Pending;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Which output streams of the external tool to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCapture {
    pub stdout: bool,
    pub stderr: bool,
}

impl OutputCapture {
    pub fn both() -> Self {
        Self {
            stdout: true,
            stderr: true,
        }
    }

    pub fn none() -> Self {
        Self {
            stdout: false,
            stderr: false,
        }
    }
}

/// A fixed external tool invocation: program, working directory, argument
/// list, and capture options. The argument list is passed through verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInvocation {
    pub program: String,
    pub working_dir: PathBuf,
    pub args: Vec<String>,
    pub capture: OutputCapture,
}

/// What the external tool reported. A non-zero exit code is a result, not a
/// wrapper error; callers inspect `exit_code` to tell the two apart.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Terminal outcome of one invocation.
///
/// `Finished` is the tool's own report (including failure exit codes);
/// `Error` means the wrapper could not run or observe the tool at all;
/// `Cancelled` is the expected outcome after [`CommandTask::cancel`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Finished(CommandResult),
    Cancelled,
    Error(String),
}

/// One in-flight external invocation bound to a configuration snapshot.
///
/// Construction returns immediately; the child process runs concurrently
/// with the caller. [`CommandTask::try_result`] is a non-blocking poll that
/// keeps returning the same outcome once the invocation is done.
#[derive(Debug)]
pub struct CommandTask<C> {
    context: C,
    pending: Pending<CommandOutcome>,
    cancel: Option<oneshot::Sender<()>>,
    outcome: Option<CommandOutcome>,
}

impl<C> CommandTask<C> {
    /// Starts the invocation on a worker task. `context` must be a snapshot
    /// (deep copy) of the relevant configuration, never the live editable
    /// value.
    pub fn spawn(invocation: CommandInvocation, context: C) -> Self {
        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        debug!(
            "spawning '{}' with args {:?} in {}",
            invocation.program,
            invocation.args,
            invocation.working_dir.display()
        );

        let worker = tokio::spawn(async move {
            let outcome = run_invocation(invocation, cancel_rx).await;
            let _ = result_tx.send(outcome);
        });

        Self {
            context,
            pending: Pending::new(result_rx, worker),
            cancel: Some(cancel_tx),
            outcome: None,
        }
    }

    /// The configuration snapshot this task was started with. Available at
    /// any time, independent of completion state.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Non-blocking poll. `None` while the invocation is still running;
    /// once done, every subsequent call returns the same outcome.
    pub fn try_result(&mut self) -> Option<&CommandOutcome> {
        if self.outcome.is_none() {
            if let Some(outcome) = self.pending.try_take() {
                self.outcome = Some(outcome);
            }
        }

        self.outcome.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    /// Requests cooperative cancellation. The worker kills the child and
    /// reports `Cancelled`; callers keep polling until the outcome arrives.
    /// Calling this more than once, or after completion, has no effect.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Releases the underlying worker and completion slot. Idempotent, and
    /// also run on drop; a task released while still running is cancelled
    /// so the child process does not outlive the wrapper.
    pub fn release(&mut self) {
        self.cancel();
        self.pending.release();
    }
}

impl<C> Drop for CommandTask<C> {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run_invocation(
    invocation: CommandInvocation,
    mut cancel: oneshot::Receiver<()>,
) -> CommandOutcome {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(stream_mode(invocation.capture.stdout))
        .stderr(stream_mode(invocation.capture.stderr))
        // Covers release-while-running: if the worker is aborted, dropping
        // the child kills the process.
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return CommandOutcome::Error(format!(
                "failed to start '{}': {}",
                invocation.program, err
            ));
        }
    };

    let stdout_capture = spawn_capture(&mut child, CapturedStream::Stdout);
    let stderr_capture = spawn_capture(&mut child, CapturedStream::Stderr);

    let wait_result = tokio::select! {
        status = child.wait() => Some(status),
        _ = &mut cancel => None,
    };

    let status = match wait_result {
        Some(Ok(status)) => status,
        Some(Err(err)) => {
            return CommandOutcome::Error(format!("failed to await child: {}", err));
        }
        // Cancellation requested: kill the child and reap it before
        // reporting, so the outcome is only visible once the process is
        // gone.
        None => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return CommandOutcome::Cancelled;
        }
    };

    let stdout = match collect_capture(stdout_capture).await {
        Ok(text) => text,
        Err(err) => return CommandOutcome::Error(format!("stdout capture failed: {}", err)),
    };
    let stderr = match collect_capture(stderr_capture).await {
        Ok(text) => text,
        Err(err) => return CommandOutcome::Error(format!("stderr capture failed: {}", err)),
    };

    CommandOutcome::Finished(CommandResult {
        exit_code: status.code(),
        stdout,
        stderr,
    })
}

fn stream_mode(capture: bool) -> Stdio {
    if capture {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

enum CapturedStream {
    Stdout,
    Stderr,
}

/// Reads a captured stream to the end on its own task so the child cannot
/// block on a full pipe while we wait for it to exit.
fn spawn_capture(child: &mut Child, stream: CapturedStream) -> Option<JoinHandle<std::io::Result<String>>> {
    match stream {
        CapturedStream::Stdout => child.stdout.take().map(|mut out| {
            tokio::spawn(async move {
                let mut buffer = Vec::new();
                out.read_to_end(&mut buffer).await?;
                Ok(String::from_utf8_lossy(&buffer).into_owned())
            })
        }),
        CapturedStream::Stderr => child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buffer = Vec::new();
                err.read_to_end(&mut buffer).await?;
                Ok(String::from_utf8_lossy(&buffer).into_owned())
            })
        }),
    }
}

async fn collect_capture(
    capture: Option<JoinHandle<std::io::Result<String>>>,
) -> Result<String, String> {
    let Some(handle) = capture else {
        return Ok(String::new());
    };

    match handle.await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(err.to_string()),
        Err(err) => Err(err.to_string()),
    }
}
