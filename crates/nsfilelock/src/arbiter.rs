//! Races the holder's answer against the acquisition deadline.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::holder::{BUSY_RESPONSE, SUCCESS_RESPONSE};
use crate::response::{Response, STREAM_COUNT};

/// Reason reported when every stream closes without a message.
pub(crate) const SILENT_EXIT_REASON: &str = "holder exited without reporting a result";

/// Outcome of one acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// The holder announced the success token.
    Acquired,
    /// A non-blocking holder found the lock taken.
    Busy,
    /// The holder said something else; the text is the reason.
    Failed(String),
    /// Nothing decisive arrived before the deadline.
    TimedOut,
}

/// Waits for the first decisive response or the deadline, whichever comes
/// first.
///
/// A message equal to [`SUCCESS_RESPONSE`] wins the lock, [`BUSY_RESPONSE`]
/// means it is held elsewhere, and any other message fails it. A stream closing without text is not decisive on its own, but
/// once all streams have closed the holder is known to be gone and the
/// attempt fails without waiting out the deadline.
pub(crate) fn arbitrate(responses: &Receiver<Response>, timeout: Duration) -> Verdict {
    let deadline = Instant::now().checked_add(timeout);
    let mut closed = 0;
    loop {
        let next = deadline.map_or_else(
            || {
                responses
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected)
            },
            |until| responses.recv_timeout(until.saturating_duration_since(Instant::now())),
        );
        match next {
            Ok(Response::Message { text, .. }) if text == SUCCESS_RESPONSE => {
                return Verdict::Acquired;
            }
            Ok(Response::Message { text, .. }) if text == BUSY_RESPONSE => {
                return Verdict::Busy;
            }
            Ok(Response::Message { text, .. }) => return Verdict::Failed(text),
            Ok(Response::Closed { .. }) => {
                closed += 1;
                if closed >= STREAM_COUNT {
                    return Verdict::Failed(SILENT_EXIT_REASON.to_owned());
                }
            }
            Err(RecvTimeoutError::Timeout) => return Verdict::TimedOut,
            Err(RecvTimeoutError::Disconnected) => {
                return Verdict::Failed(SILENT_EXIT_REASON.to_owned());
            }
        }
    }
}
