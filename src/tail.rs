//! Live tail of the running iteration's output.
//!
//! A low-priority background thread follows the iteration's stream file and
//! echoes new lines to the operator's terminal. It owns no shared state: the
//! stream file is its only input, stderr its only output, and a channel its
//! only control surface. The loop stops it (with a best-effort join) as soon
//! as the iteration's subprocess finishes, so it never outlives its iteration.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

/// Follower state: remembers how far into the stream file we have printed.
struct TailFollower {
    path: PathBuf,
    offset: u64,
    max_lines_per_poll: usize,
    pending: Vec<u8>,
}

impl TailFollower {
    fn new(path: PathBuf, max_lines_per_poll: usize) -> Self {
        Self {
            path,
            offset: 0,
            max_lines_per_poll,
            pending: Vec::new(),
        }
    }

    /// Print lines appended to the stream file since the last poll.
    ///
    /// The file may not exist yet (the subprocess has not written anything);
    /// that is not an error. A burst larger than `max_lines_per_poll` is
    /// elided down to its tail so a chatty agent cannot flood the terminal.
    fn poll<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        let Ok(mut file) = File::open(&self.path) else {
            return Ok(());
        };
        file.seek(SeekFrom::Start(self.offset))?;
        let mut new_bytes = Vec::new();
        file.read_to_end(&mut new_bytes)?;
        if new_bytes.is_empty() {
            return Ok(());
        }
        self.offset += new_bytes.len() as u64;
        self.pending.extend_from_slice(&new_bytes);

        // Only print complete lines; keep a partial trailing line buffered.
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Ok(());
        };
        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        let text = String::from_utf8_lossy(&complete);
        let lines: Vec<&str> = text.lines().collect();

        let skip = lines.len().saturating_sub(self.max_lines_per_poll);
        if skip > 0 {
            writeln!(out, "  ... {skip} lines elided ...")?;
        }
        for line in &lines[skip..] {
            writeln!(out, "  | {line}")?;
        }
        out.flush()
    }
}

/// Handle to a running tail thread.
pub struct TailHandle {
    stop_tx: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl TailHandle {
    /// Ask the thread to stop and wait for it. Best effort: a tail that
    /// already exited (stream file unreadable, stderr closed) is fine.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            warn!("tail thread panicked");
        }
    }
}

/// Spawn a follower for `stream_path`, echoing to stderr every `interval`.
pub fn spawn_tail(stream_path: PathBuf, max_lines_per_poll: usize, interval: Duration) -> TailHandle {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let handle = thread::spawn(move || {
        let mut follower = TailFollower::new(stream_path, max_lines_per_poll);
        let mut stderr = std::io::stderr();
        loop {
            match stop_rx.recv_timeout(interval) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
            if follower.poll(&mut stderr).is_err() {
                break;
            }
        }
        // Final drain so output arriving in the last interval still shows.
        let _ = follower.poll(&mut stderr);
    });
    TailHandle { stop_tx, handle }
}
