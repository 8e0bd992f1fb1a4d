//! Scripted log player
//!
//! Reveals a script into an append-only [`LogBuffer`], one line per delay.
//! The single-segment and gated two-segment variants are one state machine:
//!
//! ```text
//! Idle ─start─▶ RunningSegmentOne ─┬─(simple)──────────────────────────────▶ Done
//!                                  └─(gated)─▶ AwaitingOverride ─override─▶ RunningSegmentTwo ─▶ Done
//! ```
//!
//! While the [`InteractionGate`] is raised nothing is appended. The
//! acknowledgment line written on override always precedes segment two.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::delay::DelayPolicy;
use super::timer::{TaskHandle, sleep_unless_cancelled};
use super::typewriter::Completion;
use crate::observability::events::{EventSink, SequenceEvent};
use crate::observability::metrics;

// ============================================================================
// Line classification
// ============================================================================

/// Visual treatment of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineClass {
    /// Ordinary progress line.
    Normal,
    /// Contains a warning marker.
    Warning,
    /// Contains an error marker.
    Error,
}

const ERROR_MARKERS: [&str; 4] = ["error", "critical", "错误", "过载"];
const WARNING_MARKERS: [&str; 3] = ["warning", "alert", "警告"];

impl LineClass {
    /// Classifies a line by the markers it contains (ASCII case-insensitive).
    /// Error markers win over warning markers.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        if ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Error
        } else if WARNING_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    /// Lowercase name, used for metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Which variant to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerMode {
    /// One segment, then completion.
    Simple {
        /// Lines in reveal order.
        script: Vec<String>,
        /// Per-line delay.
        policy: DelayPolicy,
        /// Pause between the last line and completion.
        settle: Duration,
    },
    /// Two segments separated by a manual override.
    Gated {
        /// Lines before the gate.
        segment_one: Vec<String>,
        /// Per-line delay before the gate.
        segment_one_policy: DelayPolicy,
        /// Text of the user-attributed acknowledgment.
        acknowledgment: String,
        /// Pause between the acknowledgment and segment two.
        acknowledgment_delay: Duration,
        /// Lines after the override.
        segment_two: Vec<String>,
        /// Per-line delay after the override.
        segment_two_policy: DelayPolicy,
        /// Pause between the last line and completion.
        settle: Duration,
    },
}

/// Log player settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    /// Variant and scripts.
    pub mode: PlayerMode,
    /// Prefix for scripted lines.
    pub system_marker: String,
    /// Prefix for the acknowledgment line.
    pub user_marker: String,
}

// ============================================================================
// State
// ============================================================================

/// Where the player is in its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerPhase {
    /// Not started.
    Idle,
    /// Revealing the first (or only) segment.
    RunningSegmentOne,
    /// Gate raised; waiting for the override.
    AwaitingOverride,
    /// Revealing the post-override segment.
    RunningSegmentTwo,
    /// Completion signalled.
    Done,
}

/// Ordered, append-only sequence of revealed lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBuffer {
    lines: Vec<String>,
}

impl LogBuffer {
    /// Appends a line and returns its index.
    fn push(&mut self, line: String) -> usize {
        self.lines.push(line);
        self.lines.len() - 1
    }

    fn clear(&mut self) {
        self.lines.clear();
    }

    /// Returns the revealed lines in order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns the number of revealed lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns whether nothing has been revealed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Pause point requiring an explicit external action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionGate {
    /// Whether the override is currently required.
    pub required: bool,
}

struct PlayerInner {
    phase: PlayerPhase,
    buffer: LogBuffer,
    gate: InteractionGate,
    on_complete: Option<Completion>,
}

// ============================================================================
// Player
// ============================================================================

/// Shared handles needed by segment tasks.
#[derive(Clone)]
struct PlayerCore {
    settings: Arc<PlayerSettings>,
    inner: Arc<Mutex<PlayerInner>>,
    events: EventSink,
}

/// Plays a script into a [`LogBuffer`] with per-line timing.
///
/// Only one segment task runs at a time. Methods that start work must be
/// called from within a tokio runtime.
pub struct ScriptedLogPlayer {
    core: PlayerCore,
    cancel: CancellationToken,
    task: Mutex<Option<TaskHandle>>,
}

impl std::fmt::Debug for ScriptedLogPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.core.lock();
        f.debug_struct("ScriptedLogPlayer")
            .field("phase", &inner.phase)
            .field("lines", &inner.buffer.len())
            .field("gate", &inner.gate)
            .finish_non_exhaustive()
    }
}

impl ScriptedLogPlayer {
    /// Creates an idle player. Cancelling `parent` stops playback.
    #[must_use]
    pub fn new(settings: PlayerSettings, events: EventSink, parent: &CancellationToken) -> Self {
        Self {
            core: PlayerCore {
                settings: Arc::new(settings),
                inner: Arc::new(Mutex::new(PlayerInner {
                    phase: PlayerPhase::Idle,
                    buffer: LogBuffer::default(),
                    gate: InteractionGate::default(),
                    on_complete: None,
                })),
                events,
            },
            cancel: parent.child_token(),
            task: Mutex::new(None),
        }
    }

    /// Starts a new processing session.
    ///
    /// Clears the buffer and gate, then runs segment one. `on_complete` runs
    /// once after the whole script (every segment) and its settle delay.
    /// Returns `false` without side effects if a session is already running
    /// or the player has been cancelled.
    pub fn start(&self, on_complete: Completion) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        {
            let mut inner = self.core.lock();
            if !matches!(inner.phase, PlayerPhase::Idle | PlayerPhase::Done) {
                warn!(phase = ?inner.phase, "log player already running");
                return false;
            }
            inner.phase = PlayerPhase::RunningSegmentOne;
            inner.buffer.clear();
            inner.gate = InteractionGate::default();
            inner.on_complete = Some(on_complete);
        }

        let core = self.core.clone();
        info!(gated = core.is_gated(), "log playback started");
        self.replace_task(TaskHandle::spawn(&self.cancel, move |token| async move {
            core.run_segment_one(token).await;
        }));
        true
    }

    /// Performs the manual override.
    ///
    /// Only has an effect while the gate is raised: clears it, appends the
    /// acknowledgment line, and schedules segment two. Returns whether the
    /// override was accepted.
    pub fn override_gate(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let PlayerMode::Gated {
            acknowledgment,
            acknowledgment_delay,
            ..
        } = &self.core.settings.mode
        else {
            debug!("override ignored: player is not gated");
            return false;
        };

        {
            let mut inner = self.core.lock();
            if inner.phase != PlayerPhase::AwaitingOverride || !inner.gate.required {
                debug!(phase = ?inner.phase, "override ignored: gate not raised");
                return false;
            }
            inner.gate.required = false;
            inner.phase = PlayerPhase::RunningSegmentTwo;
            self.core.events.send(SequenceEvent::GateCleared);
            let line = format!("{}{}", self.core.settings.user_marker, acknowledgment);
            PlayerCore::append_locked(&mut inner, &self.core.events, line);
        }
        info!("manual override accepted");

        let core = self.core.clone();
        let pause = *acknowledgment_delay;
        self.replace_task(TaskHandle::spawn(&self.cancel, move |token| async move {
            if sleep_unless_cancelled(pause, &token).await {
                core.run_segment_two(token).await;
            }
        }));
        true
    }

    /// Stops playback. Pending completion never fires.
    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(task) = lock_task(&self.task).take() {
            task.cancel();
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> PlayerPhase {
        self.core.lock().phase
    }

    /// Returns a snapshot of the revealed lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.core.lock().buffer.lines().to_vec()
    }

    /// Returns the current gate state.
    #[must_use]
    pub fn gate(&self) -> InteractionGate {
        self.core.lock().gate
    }

    fn replace_task(&self, task: TaskHandle) {
        // Dropping the previous handle cancels it; it has already finished
        // its segment by the time a new one is scheduled.
        *lock_task(&self.task) = Some(task);
    }
}

impl Drop for ScriptedLogPlayer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl PlayerCore {
    fn lock(&self) -> MutexGuard<'_, PlayerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_gated(&self) -> bool {
        matches!(self.settings.mode, PlayerMode::Gated { .. })
    }

    async fn run_segment_one(&self, token: CancellationToken) {
        match &self.settings.mode {
            PlayerMode::Simple {
                script,
                policy,
                settle,
            } => {
                if !self.play(script, policy, &token).await {
                    return;
                }
                if sleep_unless_cancelled(*settle, &token).await {
                    self.finish();
                }
            }
            PlayerMode::Gated {
                segment_one,
                segment_one_policy,
                ..
            } => {
                if self.play(segment_one, segment_one_policy, &token).await {
                    self.raise_gate();
                }
            }
        }
    }

    async fn run_segment_two(&self, token: CancellationToken) {
        let PlayerMode::Gated {
            segment_two,
            segment_two_policy,
            settle,
            ..
        } = &self.settings.mode
        else {
            return;
        };
        if !self.play(segment_two, segment_two_policy, &token).await {
            return;
        }
        if sleep_unless_cancelled(*settle, &token).await {
            self.finish();
        }
    }

    /// Appends each line after its delay. Returns `false` if cancelled.
    async fn play(&self, script: &[String], policy: &DelayPolicy, token: &CancellationToken) -> bool {
        for (i, text) in script.iter().enumerate() {
            if !sleep_unless_cancelled(policy.delay_for(i), token).await {
                debug!(line = i, "log playback cancelled");
                return false;
            }
            let mut inner = self.lock();
            if token.is_cancelled() {
                return false;
            }
            if inner.gate.required {
                warn!(line = i, "gate raised mid-segment; dropping line");
                return false;
            }
            let line = format!("{}{}", self.settings.system_marker, text);
            Self::append_locked(&mut inner, &self.events, line);
        }
        true
    }

    fn append_locked(inner: &mut PlayerInner, events: &EventSink, line: String) {
        let class = LineClass::classify(&line);
        let index = inner.buffer.push(line.clone());
        debug!(index, ?class, "log line appended");
        metrics::record_log_line(class);
        events.send(SequenceEvent::LogAppended {
            index,
            text: line,
            class,
        });
    }

    fn raise_gate(&self) {
        let mut inner = self.lock();
        inner.gate.required = true;
        inner.phase = PlayerPhase::AwaitingOverride;
        self.events.send(SequenceEvent::GateRaised);
        info!(lines = inner.buffer.len(), "gate raised; awaiting manual override");
    }

    fn finish(&self) {
        let done = {
            let mut inner = self.lock();
            inner.phase = PlayerPhase::Done;
            inner.on_complete.take()
        };
        info!("log playback complete");
        if let Some(done) = done {
            done();
        }
    }
}

fn lock_task(task: &Mutex<Option<TaskHandle>>) -> MutexGuard<'_, Option<TaskHandle>> {
    task.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn simple(script: &[&str], policy: DelayPolicy) -> PlayerSettings {
        PlayerSettings {
            mode: PlayerMode::Simple {
                script: lines(script),
                policy,
                settle: Duration::from_millis(600),
            },
            system_marker: "> [SYSTEM]: ".into(),
            user_marker: "> [USER]: ".into(),
        }
    }

    fn gated() -> PlayerSettings {
        PlayerSettings {
            mode: PlayerMode::Gated {
                segment_one: lines(&["one", "two"]),
                segment_one_policy: DelayPolicy::fixed(Duration::from_millis(350)),
                acknowledgment: "override".into(),
                acknowledgment_delay: Duration::from_millis(500),
                segment_two: lines(&["three", "four", "five"]),
                segment_two_policy: DelayPolicy::accelerating_ms(400, 30, 50),
                settle: Duration::from_millis(1200),
            },
            system_marker: "> [SYSTEM]: ".into(),
            user_marker: "> [USER]: ".into(),
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Completion) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (
            count,
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    async fn next_append(rx: &mut UnboundedReceiver<SequenceEvent>) -> (usize, String) {
        match rx.recv().await {
            Some(SequenceEvent::LogAppended { index, text, .. }) => (index, text),
            other => panic!("expected LogAppended, got {other:?}"),
        }
    }

    #[test]
    fn classification() {
        assert_eq!(LineClass::classify("> [SYSTEM]: ROOT ACCESS"), LineClass::Normal);
        assert_eq!(LineClass::classify("警告: 检索到 1 个终极答案"), LineClass::Warning);
        assert_eq!(LineClass::classify("WARNING: low disk"), LineClass::Warning);
        assert_eq!(LineClass::classify("系统过载: 真相即将溢出"), LineClass::Error);
        assert_eq!(LineClass::classify("Critical Error"), LineClass::Error);
        assert_eq!(LineClass::classify("warning and error"), LineClass::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn simple_script_appends_in_order_then_completes() {
        let (sink, mut rx) = EventSink::channel();
        let root = CancellationToken::new();
        let player = ScriptedLogPlayer::new(
            simple(&["a", "b", "c"], DelayPolicy::accelerating_ms(400, 30, 50)),
            sink,
            &root,
        );
        let (count, done) = counter();

        let started = Instant::now();
        assert!(player.start(done));
        assert_eq!(player.phase(), PlayerPhase::RunningSegmentOne);

        let mut stamps = Vec::new();
        for expected in ["a", "b", "c"] {
            let (_, text) = next_append(&mut rx).await;
            assert_eq!(text, format!("> [SYSTEM]: {expected}"));
            stamps.push(started.elapsed().as_millis());
        }
        // 400, +370, +340
        for (got, want) in stamps.iter().zip([400, 770, 1110]) {
            assert!((want..want + 5).contains(got), "line at {got}ms, expected {want}ms");
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(590)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(player.phase(), PlayerPhase::Done);
        assert_eq!(player.lines().len(), 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn gated_script_waits_for_override() {
        let (sink, mut rx) = EventSink::channel();
        let root = CancellationToken::new();
        let player = ScriptedLogPlayer::new(gated(), sink, &root);
        let (count, done) = counter();

        assert!(!player.override_gate(), "override before gate is a no-op");
        assert!(player.start(done));
        assert_eq!(next_append(&mut rx).await.1, "> [SYSTEM]: one");
        assert!(!player.override_gate(), "override mid-segment is a no-op");
        assert_eq!(next_append(&mut rx).await.1, "> [SYSTEM]: two");
        assert_eq!(rx.recv().await, Some(SequenceEvent::GateRaised));
        assert!(player.gate().required);
        assert_eq!(player.phase(), PlayerPhase::AwaitingOverride);

        // Nothing moves while the gate is up.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(player.lines().len(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert!(player.override_gate());
        assert!(!player.override_gate(), "second override is a no-op");
        assert!(!player.gate().required);
        assert_eq!(rx.recv().await, Some(SequenceEvent::GateCleared));
        assert_eq!(next_append(&mut rx).await, (2, "> [USER]: override".to_string()));

        let resumed = Instant::now();
        assert_eq!(next_append(&mut rx).await.1, "> [SYSTEM]: three");
        let waited = resumed.elapsed();
        assert!(waited >= Duration::from_millis(900) && waited < Duration::from_millis(905));
        assert_eq!(next_append(&mut rx).await.1, "> [SYSTEM]: four");
        assert_eq!(next_append(&mut rx).await.1, "> [SYSTEM]: five");
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1210)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(player.phase(), PlayerPhase::Done);
        assert_eq!(player.lines().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_playback_and_completion() {
        let (sink, mut rx) = EventSink::channel();
        let root = CancellationToken::new();
        let player = ScriptedLogPlayer::new(
            simple(&["a", "b"], DelayPolicy::fixed(Duration::from_millis(100))),
            sink,
            &root,
        );
        let (count, done) = counter();
        player.start(done);
        next_append(&mut rx).await;

        root.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(player.lines().len(), 1);
        let (_, again) = counter();
        assert!(!player.start(again));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_done_clears_buffer() {
        let (sink, _rx) = EventSink::channel();
        let root = CancellationToken::new();
        let player = ScriptedLogPlayer::new(
            simple(&["a"], DelayPolicy::fixed(Duration::from_millis(10))),
            sink,
            &root,
        );
        let (first, done) = counter();
        assert!(player.start(done));
        let (_, busy) = counter();
        assert!(!player.start(busy), "cannot start while running");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(player.lines().len(), 1);

        let (second, done) = counter();
        assert!(player.start(done));
        assert!(player.lines().is_empty());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(player.lines(), vec!["> [SYSTEM]: a".to_string()]);
    }
}
