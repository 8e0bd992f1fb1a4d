//! Sequence event stream.
//!
//! Every externally visible change made by the sequencer, the typewriters,
//! the log player and the noise feed is published as a [`SequenceEvent`]
//! on an unbounded channel. Hosts render from that channel; the JSONL
//! [`EventEmitter`] serializes it with a monotonically increasing sequence
//! number for machine consumers.

use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::sequence::log_player::LineClass;
use crate::sequence::stage::Stage;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted while the sequence runs.
///
/// Tagged with `"type"` when serialized so consumers can dispatch on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SequenceEvent {
    /// A stage was entered. `from` is `None` for the initial stage.
    StageChanged {
        /// Previous stage.
        from: Option<Stage>,
        /// Newly active stage.
        to: Stage,
    },

    /// A typewriter revealed one more unit.
    TypewriterTick {
        /// Index of the scan line being typed.
        line: usize,
        /// Everything revealed so far.
        visible: String,
    },

    /// A typewriter reached the end of its text.
    TypewriterComplete {
        /// Index of the scan line that finished.
        line: usize,
    },

    /// A line was appended to the processing log.
    LogAppended {
        /// Zero-based position in the log buffer.
        index: usize,
        /// Full line text including its marker prefix.
        text: String,
        /// Visual classification.
        class: LineClass,
    },

    /// The log player paused and is waiting for a manual override.
    GateRaised,

    /// The manual override was accepted.
    GateCleared,

    /// A cosmetic background line.
    NoiseLine {
        /// Line text.
        text: String,
    },

    /// The final destination was handed to the navigator.
    Redirect {
        /// Destination URL.
        url: String,
    },
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Cloneable sending half of the event stream.
///
/// Sending never fails from the caller's point of view: a dropped receiver
/// just means nobody is watching.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SequenceEvent>>,
}

impl EventSink {
    /// Creates a connected sink and its receiver.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SequenceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates a sink that discards everything.
    #[must_use]
    pub const fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Publishes an event.
    pub fn send(&self, event: SequenceEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number and timestamp via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope<'a> {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// When the event was written.
    timestamp: DateTime<Utc>,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: &'a SequenceEvent,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are silently dropped because rendering
/// must never abort the sequence.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: &SequenceEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            timestamp: Utc::now(),
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
