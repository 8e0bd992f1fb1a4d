//! Stage sequencer
//!
//! Owns the current [`Stage`] and every timer that moves it forward. The
//! scan typewriters and the log player report back through one-shot
//! callbacks holding a `Weak` reference, so a dropped sequencer is never
//! kept alive by its own timers.
//!
//! Only one auto-transition timer is pending at a time. [`teardown`]
//! cancels the root token; child tokens cascade to the typewriters and the
//! log player.
//!
//! [`teardown`]: StageSequencer::teardown

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::log_player::ScriptedLogPlayer;
use super::redirect::build_redirect_url;
use super::stage::{Stage, StageEvent};
use super::timer::TaskHandle;
use super::typewriter::TypewriterRevealer;
use crate::config::schema::SequenceConfig;
use crate::observability::events::{EventSink, SequenceEvent};
use crate::observability::metrics;

// ============================================================================
// Navigation
// ============================================================================

/// Host-side navigation. Fire-and-forget: no retries, no verification.
pub trait Navigator: Send + Sync {
    /// Sends the viewer to `url`.
    fn navigate(&self, url: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, url: &str) {
        self(url);
    }
}

/// Navigator that only remembers the URLs it was given.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    urls: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every URL navigated to, in order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}

// ============================================================================
// Sequencer
// ============================================================================

#[derive(Debug)]
struct SequencerState {
    stage: Stage,
    started: bool,
    query: Option<String>,
    torn_down: bool,
}

/// Drives the presentation from `Intro` to `Redirecting`.
///
/// Methods that schedule work must be called from within a tokio runtime.
pub struct StageSequencer {
    me: Weak<Self>,
    config: Arc<SequenceConfig>,
    events: EventSink,
    navigator: Arc<dyn Navigator>,
    root: CancellationToken,
    state: Mutex<SequencerState>,
    pending: Mutex<Option<TaskHandle>>,
    typewriters: Mutex<Vec<TypewriterRevealer>>,
    player: ScriptedLogPlayer,
}

impl std::fmt::Debug for StageSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSequencer")
            .field("state", &*self.lock_state())
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

impl StageSequencer {
    /// Creates an unstarted sequencer.
    ///
    /// A `pace` other than `1.0` is applied to every delay here. A config
    /// that cannot be paced (validation rejects these) runs as written.
    #[must_use]
    pub fn new(config: Arc<SequenceConfig>, events: EventSink, navigator: Arc<dyn Navigator>) -> Arc<Self> {
        let config = if (config.pace - 1.0).abs() > f64::EPSILON {
            match config.paced() {
                Ok(paced) => Arc::new(paced),
                Err(issue) => {
                    warn!(%issue, "pace ignored");
                    config
                }
            }
        } else {
            config
        };
        let root = CancellationToken::new();
        let player = ScriptedLogPlayer::new(config.processing.player_settings(), events.clone(), &root);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            events,
            navigator,
            root,
            state: Mutex::new(SequencerState {
                stage: Stage::Intro,
                started: false,
                query: None,
                torn_down: false,
            }),
            pending: Mutex::new(None),
            typewriters: Mutex::new(Vec::new()),
            player,
        })
    }

    /// Enters `Intro` and schedules the move to `Scanning`.
    ///
    /// Returns `false` if already started or torn down.
    pub fn start(&self) -> bool {
        {
            let mut state = self.lock_state();
            if state.started || state.torn_down {
                return false;
            }
            state.started = true;
            state.stage = Stage::Intro;
            self.events.send(SequenceEvent::StageChanged {
                from: None,
                to: Stage::Intro,
            });
        }
        metrics::record_stage(Stage::Intro);
        info!(stage = %Stage::Intro, "sequence started");

        let me = self.me.clone();
        self.schedule(self.config.intro.delay, "intro", move || {
            if let Some(this) = me.upgrade() {
                this.on_intro_elapsed();
            }
        });
        true
    }

    fn on_intro_elapsed(&self) {
        if self.advance(StageEvent::IntroElapsed).is_some() {
            self.start_scan();
        }
    }

    fn start_scan(&self) {
        let scan = &self.config.scan;
        let mut typewriters = lock(&self.typewriters);
        if self.root.is_cancelled() {
            return;
        }
        typewriters.clear();

        for (line, text) in scan.preamble.iter().enumerate() {
            let mut tw = TypewriterRevealer::new(line, scan.preamble_interval, self.events.clone(), &self.root);
            tw.reveal(text, None);
            typewriters.push(tw);
        }

        let me = self.me.clone();
        let mut emphasis = TypewriterRevealer::new(
            scan.preamble.len(),
            scan.emphasis_interval,
            self.events.clone(),
            &self.root,
        );
        emphasis.reveal(
            &scan.emphasis,
            Some(Box::new(move || {
                if let Some(this) = me.upgrade() {
                    this.on_scan_complete();
                }
            })),
        );
        typewriters.push(emphasis);
        debug!(lines = typewriters.len(), "scan typewriters started");
    }

    /// Moves `Scanning` to `AccessGranted` and schedules the query prompt.
    ///
    /// Only the first call has an effect.
    pub fn on_scan_complete(&self) {
        if self.advance(StageEvent::ScanComplete).is_none() {
            debug!("scan completion ignored");
            return;
        }
        let me = self.me.clone();
        self.schedule(self.config.access.delay, "access", move || {
            if let Some(this) = me.upgrade() {
                this.advance(StageEvent::GrantElapsed);
            }
        });
    }

    /// Submits the viewer's query.
    ///
    /// Accepted only in `AwaitingInput` with a non-blank query; anything
    /// else is a silent no-op. On success processing starts immediately.
    pub fn submit(&self, query: &str) -> bool {
        {
            let mut state = self.lock_state();
            if state.torn_down || state.stage != Stage::AwaitingInput {
                debug!(stage = %state.stage, "submit ignored outside AwaitingInput");
                return false;
            }
            if query.trim().is_empty() {
                debug!("blank query ignored");
                return false;
            }
            state.query = Some(query.to_string());
            if self.transition_locked(&mut state, StageEvent::QuerySubmitted).is_none() {
                return false;
            }
        }
        info!(chars = query.chars().count(), "query submitted");

        let me = self.me.clone();
        self.player.start(Box::new(move || {
            if let Some(this) = me.upgrade() {
                this.on_processing_complete();
            }
        }));
        true
    }

    /// Moves `Processing` to `Redirecting` and schedules navigation.
    ///
    /// Invoked by the log player once every segment has played.
    pub fn on_processing_complete(&self) {
        if self.advance(StageEvent::ProcessingComplete).is_none() {
            debug!("processing completion ignored");
            return;
        }
        let me = self.me.clone();
        self.schedule(self.config.redirect.delay, "redirect", move || {
            if let Some(this) = me.upgrade() {
                this.navigate();
            }
        });
    }

    fn navigate(&self) {
        let url = {
            let state = self.lock_state();
            if state.torn_down || state.stage != Stage::Redirecting {
                return;
            }
            let query = state.query.as_deref().unwrap_or_default();
            let url = build_redirect_url(&self.config.redirect.target(), query);
            self.events.send(SequenceEvent::Redirect { url: url.clone() });
            url
        };
        metrics::record_redirect();
        info!(%url, "redirecting");
        self.navigator.navigate(&url);
    }

    /// Forwards the manual override to the log player.
    ///
    /// Returns whether the override had an effect.
    pub fn override_gate(&self) -> bool {
        if self.lock_state().torn_down {
            return false;
        }
        self.player.override_gate()
    }

    /// Cancels every pending timer. Idempotent.
    ///
    /// After teardown no stage change, event, or navigation occurs.
    pub fn teardown(&self) {
        {
            let mut state = self.lock_state();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
        }
        self.root.cancel();
        lock(&self.pending).take();
        lock(&self.typewriters).clear();
        self.player.cancel();
        info!("sequence torn down");
    }

    /// Returns the active stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.lock_state().stage
    }

    /// Returns the submitted query, if any.
    #[must_use]
    pub fn query(&self) -> Option<String> {
        self.lock_state().query.clone()
    }

    /// Returns the processing log so far.
    #[must_use]
    pub fn log_lines(&self) -> Vec<String> {
        self.player.lines()
    }

    /// Returns whether the manual override is currently required.
    #[must_use]
    pub fn gate_required(&self) -> bool {
        self.player.gate().required
    }

    /// Returns whether [`teardown`](Self::teardown) has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.lock_state().torn_down
    }

    /// Returns the effective (paced) configuration.
    #[must_use]
    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    fn advance(&self, event: StageEvent) -> Option<Stage> {
        let mut state = self.lock_state();
        self.transition_locked(&mut state, event)
    }

    fn transition_locked(&self, state: &mut SequencerState, event: StageEvent) -> Option<Stage> {
        if state.torn_down || !state.started {
            return None;
        }
        let from = state.stage;
        let to = from.next(event)?;
        state.stage = to;
        self.events.send(SequenceEvent::StageChanged { from: Some(from), to });
        metrics::record_stage(to);
        info!(%from, %to, "stage changed");
        Some(to)
    }

    fn schedule<F>(&self, delay: Duration, label: &'static str, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = lock(&self.pending);
        if self.root.is_cancelled() {
            return;
        }
        debug!(label, ?delay, "timer scheduled");
        *pending = Some(TaskHandle::schedule(&self.root, delay, label, action));
    }

    fn lock_state(&self) -> MutexGuard<'_, SequencerState> {
        lock(&self.state)
    }
}

impl Drop for StageSequencer {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequencer(config: SequenceConfig) -> (Arc<StageSequencer>, Arc<RecordingNavigator>) {
        let nav = Arc::new(RecordingNavigator::new());
        let seq = StageSequencer::new(Arc::new(config), EventSink::disconnected(), nav.clone());
        (seq, nav)
    }

    #[tokio::test(start_paused = true)]
    async fn intro_moves_to_scanning_after_delay() {
        let (seq, _) = sequencer(SequenceConfig::default());
        assert!(seq.start());
        assert!(!seq.start());
        assert_eq!(seq.stage(), Stage::Intro);

        tokio::time::sleep(Duration::from_millis(1490)).await;
        assert_eq!(seq.stage(), Stage::Intro);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seq.stage(), Stage::Scanning);
    }

    #[tokio::test]
    async fn unpaceable_config_runs_as_written() {
        let mut config = SequenceConfig {
            pace: 1e300,
            ..SequenceConfig::default()
        };
        config.redirect.delay = Duration::MAX;
        let (seq, _) = sequencer(config);
        assert_eq!(seq.config().redirect.delay, Duration::MAX);
        assert_eq!(seq.config().intro.delay, Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn pace_is_applied_once() {
        let (seq, _) = sequencer(SequenceConfig {
            pace: 0.5,
            ..SequenceConfig::default()
        });
        assert_eq!(seq.config().intro.delay, Duration::from_millis(750));
        assert!((seq.config().pace - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_complete_only_counts_once() {
        let (seq, _) = sequencer(SequenceConfig::default());
        seq.on_scan_complete();
        assert_eq!(seq.stage(), Stage::Intro, "ignored before start");

        seq.start();
        tokio::time::sleep(Duration::from_millis(1510)).await;
        seq.on_scan_complete();
        assert_eq!(seq.stage(), Stage::AccessGranted);
        seq.on_scan_complete();
        assert_eq!(seq.stage(), Stage::AccessGranted);

        tokio::time::sleep(Duration::from_millis(2510)).await;
        assert_eq!(seq.stage(), Stage::AwaitingInput);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_submissions_are_ignored() {
        let (seq, _) = sequencer(SequenceConfig::default());
        assert!(!seq.submit("truth"), "rejected before AwaitingInput");
        seq.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seq.stage(), Stage::AwaitingInput);

        assert!(!seq.submit(""));
        assert!(!seq.submit("   "));
        assert_eq!(seq.stage(), Stage::AwaitingInput);
        assert_eq!(seq.query(), None);

        assert!(seq.submit("truth"));
        assert_eq!(seq.stage(), Stage::Processing);
        assert_eq!(seq.query().as_deref(), Some("truth"));
        assert!(!seq.submit("again"));
        assert_eq!(seq.query().as_deref(), Some("truth"));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_through_to_navigation() {
        let (seq, nav) = sequencer(SequenceConfig::default());
        seq.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(seq.submit("熊雨贤"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(seq.stage(), Stage::Redirecting);
        assert_eq!(seq.log_lines().len(), 10);
        assert_eq!(
            nav.urls(),
            vec!["https://cn.bing.com/search?q=%E7%86%8A%E9%9B%A8%E8%B4%A4&settheme=dark".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_prevents_navigation() {
        let (seq, nav) = sequencer(SequenceConfig::default());
        seq.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        seq.submit("truth");
        tokio::time::sleep(Duration::from_millis(500)).await;

        seq.teardown();
        seq.teardown();
        let lines = seq.log_lines().len();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(seq.is_torn_down());
        assert_eq!(seq.stage(), Stage::Processing);
        assert_eq!(seq.log_lines().len(), lines);
        assert!(nav.urls().is_empty());
        assert!(!seq.override_gate());
    }

    #[tokio::test(start_paused = true)]
    async fn pace_scales_delays() {
        let config = SequenceConfig {
            pace: 0.01,
            ..SequenceConfig::default()
        };
        let (seq, _) = sequencer(config);
        assert_eq!(seq.config().intro.delay, Duration::from_millis(15));
        seq.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seq.stage(), Stage::Scanning);
    }

    #[test]
    fn closures_are_navigators() {
        let seen = Mutex::new(Vec::new());
        let nav = |url: &str| seen.lock().unwrap().push(url.to_string());
        nav.navigate("https://example.com");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
