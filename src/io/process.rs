//! Helpers for running child processes with bounded, streamed output capture.
//!
//! There is deliberately no per-invocation timeout: cancellation is the
//! operator's interrupt, which takes down the supervisor and the child
//! together. The loop's only bound is its iteration count.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

impl CommandOutput {
    /// Combined stdout + stderr as lossy UTF-8, the text the classifier scans.
    pub fn combined_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&String::from_utf8_lossy(&self.stderr));
        }
        text
    }

    pub fn truncated_notice(&self, label: &str) -> String {
        let mut notice = String::new();
        if self.stdout_truncated > 0 {
            notice.push_str(&format!(
                "[{label} stdout truncated, oldest {} bytes dropped]\n",
                self.stdout_truncated
            ));
        }
        if self.stderr_truncated > 0 {
            notice.push_str(&format!(
                "[{label} stderr truncated, oldest {} bytes dropped]\n",
                self.stderr_truncated
            ));
        }
        notice
    }
}

/// Run a command to completion, capturing stdout/stderr without risking pipe
/// deadlocks.
///
/// Output is read concurrently while the child runs, and stdin is written on
/// its own thread so a prompt larger than the pipe buffer cannot deadlock
/// against a child that emits output before draining it. `output_limit_bytes`
/// bounds the amount of stdout/stderr stored in memory; when exceeded, the
/// OLDEST bytes are dropped and the tail is kept, because the completion
/// marker is the last thing the agent prints. If `stream_path` is `Some`,
/// each stdout line is also written there and flushed immediately so a tail
/// renderer can follow the invocation live.
#[instrument(skip_all, fields(output_limit_bytes, streaming = stream_path.is_some()))]
pub fn run_command_streamed(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    output_limit_bytes: usize,
    stream_path: Option<&Path>,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdin_handle = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let input = input.to_vec();
            Some(thread::spawn(move || -> Result<()> {
                child_stdin.write_all(&input).context("write stdin")?;
                Ok(())
            }))
        }
        None => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stream_file = match stream_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create stream dir {}", parent.display()))?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("create stream file {}", path.display()))?;
            Some(Mutex::new(std::io::BufWriter::new(file)))
        }
        None => None,
    };
    let stream_file = Arc::new(stream_file);

    let stream_file_clone = stream_file.clone();
    let stdout_handle = thread::spawn(move || {
        read_stream_limited_with_tee(stdout, output_limit_bytes, stream_file_clone)
    });
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let status = child.wait().context("wait for command")?;

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    // A child that exits without draining its stdin closes the pipe early;
    // the prompt not being read is already visible through the exit status.
    if let Some(handle) = stdin_handle {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(err = %e, "failed to write prompt to child stdin"),
            Err(_) => return Err(anyhow!("stdin writer thread panicked")),
        }
    }

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated, kept the tail");
    }

    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read a stream with a size limit, optionally tee-ing lines to a file.
fn read_stream_limited_with_tee<R: Read>(
    reader: R,
    limit: usize,
    stream_file: Arc<Option<Mutex<std::io::BufWriter<std::fs::File>>>>,
) -> Result<(Vec<u8>, usize)> {
    use std::io::BufRead;

    let mut buf_reader = std::io::BufReader::new(reader);
    let mut collected = Vec::new();
    let mut truncated = 0usize;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }

        if let Some(ref mutex) = *stream_file
            && let Ok(mut writer) = mutex.lock()
        {
            // Write and flush immediately for real-time visibility
            if let Err(e) = writer.write_all(&line) {
                warn!(err = %e, "failed to write to stream file");
            } else if let Err(e) = writer.flush() {
                warn!(err = %e, "failed to flush stream file");
            }
        }

        truncated += push_bounded(&mut collected, &line, limit);
    }

    Ok((collected, truncated))
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        truncated += push_bounded(&mut buf, &chunk[..n], limit);
    }

    Ok((buf, truncated))
}

/// Append bytes to a bounded buffer, evicting the OLDEST bytes past `limit`.
///
/// The completion marker is the last thing the agent prints, so the tail of
/// the stream is the part classification must never lose. Returns the number
/// of bytes dropped.
fn push_bounded(buf: &mut Vec<u8>, bytes: &[u8], limit: usize) -> usize {
    buf.extend_from_slice(bytes);
    if buf.len() > limit {
        let overflow = buf.len() - limit;
        buf.drain(..overflow);
        return overflow;
    }
    0
}
