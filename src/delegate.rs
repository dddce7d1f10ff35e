use crate::error::{AppResult, UserError};
use anyhow::Context;
use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    process::Command,
};
use tokio_util::sync::CancellationToken;

/// Where the child's standard input comes from.
pub enum Input {
    Inherit,
    Null,
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

/// Where a child's output stream goes.
pub enum Output {
    Inherit,
    Writer(Box<dyn AsyncWrite + Send + Unpin>),
}

/// Runs an external command inside a fixed working directory.
pub struct Runner {
    program: PathBuf,
    dir: PathBuf,
    env: Vec<(String, String)>,
    stdin: Input,
    stdout: Output,
    stderr: Output,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(
        program: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Runner {
            program: program.into(),
            dir: dir.into(),
            env: Vec::new(),
            stdin: Input::Inherit,
            stdout: Output::Inherit,
            stderr: Output::Inherit,
            cancel,
        }
    }

    /// Variables layered over the inherited environment; later pairs win.
    pub fn env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn stdin(mut self, stdin: Input) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn stdout(mut self, stdout: Output) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn stderr(mut self, stderr: Output) -> Self {
        self.stderr = stderr;
        self
    }

    /// Runs the command, discarding the captured copy of its output.
    pub async fn run(&mut self, args: &[&str]) -> AppResult<()> {
        self.output(&mut tokio::io::sink(), args).await
    }

    /// Runs the command, writing its stdout to both `capture` and the configured stdout.
    ///
    /// Stdin is consumed by the first call. Cancelling the token kills the child.
    #[tracing::instrument(
        skip(self, capture),
        fields(program = %self.program.display(), dir = %self.dir.display())
    )]
    pub async fn output<W>(&mut self, capture: &mut W, args: &[&str]) -> AppResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let Runner {
            program,
            dir,
            env,
            stdin,
            stdout,
            stderr,
            cancel,
        } = self;
        let command = describe(program, args);

        let stdin = std::mem::replace(stdin, Input::Null);
        let mut cmd = Command::new(&*program);
        cmd.args(args)
            .current_dir(&*dir)
            .envs(env.iter().map(|(key, value)| (key, value)))
            .stdin(match &stdin {
                Input::Inherit => Stdio::inherit(),
                Input::Null => Stdio::null(),
                Input::Reader(_) => Stdio::piped(),
            })
            .stdout(Stdio::piped())
            .stderr(match stderr {
                Output::Inherit => Stdio::inherit(),
                Output::Writer(_) => Stdio::piped(),
            })
            .kill_on_drop(true);

        tracing::debug!(command = %command, "Spawning external command");
        let mut child = cmd.spawn().map_err(|source| UserError::CommandFailed {
            command: command.clone(),
            source,
        })?;
        tracing::debug!(pid = ?child.id(), "Spawned external command");

        let stdin_task = match (stdin, child.stdin.take()) {
            (Input::Reader(mut reader), Some(mut pipe)) => Some(tokio::spawn(async move {
                if let Err(e) = tokio::io::copy(&mut reader, &mut pipe).await {
                    tracing::debug!(error = %e, "Stopped forwarding stdin");
                }
            })),
            _ => None,
        };

        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();

        let mut inherited_stdout;
        let stdout: &mut (dyn AsyncWrite + Send + Unpin + 'static) = match stdout {
            Output::Inherit => {
                inherited_stdout = tokio::io::stdout();
                &mut inherited_stdout
            }
            Output::Writer(writer) => &mut **writer,
        };

        let stdout_pump = async {
            match child_stdout {
                Some(pipe) => fan_out(pipe, capture, stdout).await,
                None => Ok(()),
            }
        };
        let stderr_pump = async {
            match (child_stderr, stderr) {
                (Some(mut pipe), Output::Writer(writer)) => {
                    tokio::io::copy(&mut pipe, writer).await?;
                    writer.flush().await
                }
                _ => Ok(()),
            }
        };

        let finished = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = async { tokio::join!(child.wait(), stdout_pump, stderr_pump) } => Some(result),
        };

        if let Some(task) = stdin_task {
            task.abort();
        }

        let Some((status, stdout_result, stderr_result)) = finished else {
            tracing::warn!(command = %command, "Cancellation requested, killing external command");
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "Child had already exited");
            }
            if let Err(e) = child.wait().await {
                tracing::debug!(error = %e, "Failed to reap killed child");
            }
            return Err(UserError::Cancelled { command }.into());
        };

        let status = status.map_err(|source| UserError::CommandFailed {
            command: command.clone(),
            source,
        })?;
        stdout_result.with_context(|| format!("Failed to forward stdout of '{command}'"))?;
        stderr_result.with_context(|| format!("Failed to forward stderr of '{command}'"))?;

        tracing::debug!(%status, "External command finished");
        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(UserError::CommandExited { command, code }.into()),
            None => Err(UserError::CommandTerminated {
                command,
                signal: terminating_signal(&status),
            }
            .into()),
        }
    }
}

#[cfg(unix)]
fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Copies `reader` to both writers until EOF.
async fn fan_out<R, A, B>(mut reader: R, first: &mut A, second: &mut B) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    A: AsyncWrite + Unpin + ?Sized,
    B: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        first.write_all(&buf[..n]).await?;
        second.write_all(&buf[..n]).await?;
    }
    first.flush().await?;
    second.flush().await
}

fn describe(program: &Path, args: &[&str]) -> String {
    let name = program
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_else(|| program.to_string_lossy());
    std::iter::once(name.as_ref())
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
