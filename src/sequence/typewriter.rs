//! Character-level typewriter
//!
//! [`RevealCursor`] is the pure stepping logic; [`TypewriterRevealer`]
//! drives it from a single cancellable timer task.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::timer::{TaskHandle, sleep_unless_cancelled};
use crate::observability::events::{EventSink, SequenceEvent};

/// One-shot completion callback.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Cursor over the Unicode scalar values of a target string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealCursor {
    units: Vec<char>,
    cursor: usize,
    visible: String,
}

impl RevealCursor {
    /// Creates a cursor at position 0 with nothing visible.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            units: text.chars().collect(),
            cursor: 0,
            visible: String::with_capacity(text.len()),
        }
    }

    /// Reveals the next unit and returns the visible text, or `None` if
    /// every unit is already visible.
    pub fn advance(&mut self) -> Option<&str> {
        let unit = *self.units.get(self.cursor)?;
        self.visible.push(unit);
        self.cursor += 1;
        Some(&self.visible)
    }

    /// Returns whether every unit is visible.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.units.len()
    }

    /// Returns the revealed prefix.
    #[must_use]
    pub fn visible(&self) -> &str {
        &self.visible
    }

    /// Returns the cursor position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Returns the total number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns whether the target is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Reveals a string one unit per interval and signals completion once.
///
/// Calling [`reveal`](Self::reveal) again cancels the running reveal and
/// starts over from an empty output. Must be used from within a tokio
/// runtime.
#[derive(Debug)]
pub struct TypewriterRevealer {
    line: usize,
    interval: Duration,
    events: EventSink,
    cancel: CancellationToken,
    cursor: Arc<Mutex<RevealCursor>>,
    task: Option<TaskHandle>,
}

impl TypewriterRevealer {
    /// Creates an idle revealer for scan line `line`.
    ///
    /// Cancelling `parent` stops any reveal in progress.
    #[must_use]
    pub fn new(line: usize, interval: Duration, events: EventSink, parent: &CancellationToken) -> Self {
        Self {
            line,
            interval,
            events,
            cancel: parent.child_token(),
            cursor: Arc::new(Mutex::new(RevealCursor::default())),
            task: None,
        }
    }

    /// Starts revealing `text`, replacing any reveal in progress.
    ///
    /// `on_complete` runs exactly once when the last unit is visible, or
    /// immediately (without ticking) if `text` is empty. It never runs if the
    /// reveal is cancelled or replaced first.
    pub fn reveal(&mut self, text: &str, on_complete: Option<Completion>) {
        if let Some(previous) = self.task.take() {
            debug!(line = self.line, "restarting typewriter");
            previous.cancel();
        }

        // A fresh cursor per reveal keeps a stale task from touching the new one.
        let cursor = Arc::new(Mutex::new(RevealCursor::new(text)));
        self.cursor = Arc::clone(&cursor);

        let line = self.line;
        let interval = self.interval;
        let events = self.events.clone();
        debug!(line, units = text.chars().count(), ?interval, "typewriter started");

        self.task = Some(TaskHandle::spawn(&self.cancel, move |token| async move {
            loop {
                let finished = lock(&cursor).is_finished();
                if finished {
                    break;
                }
                if !sleep_unless_cancelled(interval, &token).await {
                    return;
                }
                let visible = {
                    let mut c = lock(&cursor);
                    c.advance().map(str::to_owned)
                };
                if token.is_cancelled() {
                    return;
                }
                if let Some(visible) = visible {
                    trace!(line, %visible, "typewriter tick");
                    events.send(SequenceEvent::TypewriterTick { line, visible });
                }
            }
            debug!(line, "typewriter complete");
            events.send(SequenceEvent::TypewriterComplete { line });
            if let Some(done) = on_complete {
                done();
            }
        }));
    }

    /// Returns the text revealed so far.
    #[must_use]
    pub fn visible(&self) -> String {
        lock(&self.cursor).visible().to_string()
    }

    /// Returns whether the current target is fully revealed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        lock(&self.cursor).is_finished()
    }

    /// Stops the reveal in progress, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }
}

impl Drop for TypewriterRevealer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(cursor: &Mutex<RevealCursor>) -> std::sync::MutexGuard<'_, RevealCursor> {
    cursor.lock().unwrap_or_else(PoisonError::into_inner)
}
