//! Collection of the holder's single-line answer.
//!
//! One reader thread per output stream reads a capped line, trims newline
//! and NUL padding, and forwards exactly one [`Response`]. The first message
//! to arrive, from either stream, decides the attempt.

use std::io::{self, BufRead, BufReader, Read};
use std::process::Child;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use strum::Display;

use crate::error::LockError;

/// Holder output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stream {
    /// Standard output, where success is announced.
    Stdout,
    /// Standard error, where failures are described.
    Stderr,
}

/// What a stream reader observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Response {
    /// A non-blank line, or the text of a read error.
    Message { stream: Stream, text: String },
    /// The stream reached end of file without any text.
    Closed { stream: Stream },
}

/// Number of streams read per holder.
pub(crate) const STREAM_COUNT: usize = 2;

/// Takes the holder's output pipes and starts one reader per stream.
pub(crate) fn collect(child: &mut Child, limit: usize) -> Result<Receiver<Response>, LockError> {
    let stdout = child.stdout.take().ok_or(LockError::MissingPipe {
        stream: Stream::Stdout,
    })?;
    let stderr = child.stderr.take().ok_or(LockError::MissingPipe {
        stream: Stream::Stderr,
    })?;
    let (sender, receiver) = mpsc::channel();
    spawn_reader(Stream::Stdout, stdout, limit, sender.clone())?;
    spawn_reader(Stream::Stderr, stderr, limit, sender)?;
    Ok(receiver)
}

fn spawn_reader<R>(
    stream: Stream,
    source: R,
    limit: usize,
    sender: Sender<Response>,
) -> Result<(), LockError>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("nsfilelock-{stream}"))
        .spawn(move || {
            let response = match read_message(source, limit) {
                Ok(Some(text)) => Response::Message { stream, text },
                Ok(None) => Response::Closed { stream },
                Err(error) => Response::Message {
                    stream,
                    text: format!("failed to read holder {stream}: {error}"),
                },
            };
            // The arbiter may already have decided; a closed channel is fine.
            drop(sender.send(response));
        })
        .map(drop)
        .map_err(|source| LockError::Thread { source })
}

/// Reads the first non-blank line of at most `limit` bytes.
///
/// A line longer than `limit` is cut at `limit` bytes and the rest of the
/// stream is left unread. Trailing line terminators and NUL padding are
/// stripped; leading bytes are kept. Invalid UTF-8 is replaced rather than
/// rejected.
/// Returns `None` when the stream ends without any text.
pub(crate) fn read_message<R: Read>(source: R, limit: usize) -> io::Result<Option<String>> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX);
    let mut reader = BufReader::new(source);
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = (&mut reader).take(cap).read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&line);
        let trimmed = text.trim_end_matches(|c| matches!(c, '\n' | '\r' | '\0'));
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_owned()));
        }
    }
}
