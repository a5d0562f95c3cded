// src/exec/output.rs

//! Output capture and the per-program log multiplexer.
//!
//! Each program's stdout and stderr are read line by line by two pipe readers
//! feeding one unbounded channel (the program's combined buffer). Until the
//! program is healthy the lines just accumulate there, so they can be dumped
//! if the health check times out. Once healthy, a multiplexer task drains the
//! channel into a [`LogSink`].
//!
//! Lifetimes are tied to the process group: the readers stop at EOF, once every
//! process holding the pipe is gone, or when the program's `CancellationToken`
//! fires after the group was killed. Either way their senders drop, which ends
//! the multiplexer.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crossterm::style::{Color, Stylize, style};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Prefix colors, indexed by launch order. The last slot repeats the first.
pub const PALETTE: [Color; 7] = [
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::Red,
    Color::Green,
];

/// Color for the program launched `launch_index`-th in this run.
pub fn color_for(launch_index: usize) -> Color {
    PALETTE[launch_index % PALETTE.len()]
}

/// Destination for program output lines.
pub trait LogSink: Send + Sync + fmt::Debug {
    fn emit(&self, program: &str, color: Color, line: &str);
}

/// Writes `"<name>: "` in the program's color, then the line, to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn emit(&self, program: &str, color: Color, line: &str) {
        let prefix = style(format!("{program}: ")).with(color);
        let mut out = std::io::stdout().lock();
        // A closed stdout must not take the supervisor down.
        let _ = writeln!(out, "{prefix}{line}");
    }
}

/// Routes output to the debug log, for programs with `Log: false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, program: &str, _color: Color, line: &str) {
        debug!(program, "output: {}", line);
    }
}

/// Read `pipe` line by line into `tx` until EOF or cancellation.
///
/// Lines are split on `\n` as raw bytes and decoded lossily, so output that
/// is not valid UTF-8 is still forwarded. The read end stays open for as long
/// as any writer in the process group holds it; closing it early would hand
/// those writers a SIGPIPE.
pub fn spawn_pipe_reader<R>(
    program: String,
    pipe: R,
    tx: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            tokio::select! {
                biased;
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        // Nobody listening any more; keep draining regardless.
                        let _ = tx.send(decode_line(&buf));
                    }
                    Err(e) => {
                        debug!(program = %program, error = %e, "pipe read failed");
                        break;
                    }
                },
                _ = shutdown.cancelled() => break,
            }
        }
        trace!(program = %program, "pipe reader finished");
    })
}

/// Strip the line terminator and replace invalid UTF-8 with U+FFFD.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Forward every non-empty line from `rx` to `sink` with the program's prefix.
///
/// Ends when all pipe readers for the program are gone.
pub fn spawn_multiplexer(
    program: String,
    color: Color,
    mut rx: mpsc::UnboundedReceiver<String>,
    sink: Arc<dyn LogSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if !line.is_empty() {
                sink.emit(&program, color, &line);
            }
        }
        debug!(program = %program, "log multiplexer finished");
    })
}
