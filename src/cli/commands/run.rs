//! Terminal playback
//!
//! Builds a [`StageSequencer`] from the loaded sequence, renders its event
//! stream to stdout, and feeds it input from `--query`/stdin until the
//! redirect has been issued.

use std::collections::HashMap;
use std::io::Write;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::args::{ColorChoice, OutputFormat, RunArgs};
use crate::config::{ConfigLoader, LoaderOptions};
use crate::error::AkashicError;
use crate::noise::{NoiseFeed, spawn_noise};
use crate::observability::logging::{Stream, color_enabled};
use crate::observability::{EventEmitter, EventSink, SequenceEvent, describe_metrics};
use crate::sequence::{LineClass, Navigator, Stage, StageSequencer};

const QUERY_PROMPT: &str = "问吧 > ";
const OVERRIDE_PROMPT: &str = "[ MANUAL OVERRIDE REQUIRED ] press Enter to force the breach ";

// ============================================================================
// Command
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    Nothing,
    Query,
    Override,
}

/// Play the sequence until the redirect is issued.
///
/// # Errors
///
/// Returns an error if the configuration fails to load, stdin closes while
/// input is required, output cannot be written, or `shutdown` fires.
pub async fn run(args: &RunArgs, color: ColorChoice, shutdown: &CancellationToken) -> Result<(), AkashicError> {
    if args.query.as_deref().is_some_and(|q| q.trim().is_empty()) {
        return Err(AkashicError::Usage("--query must not be blank".into()));
    }

    let options = LoaderOptions {
        pace: args.pace,
        gated: args.gated.then_some(true),
        ..LoaderOptions::default()
    };
    let loaded = ConfigLoader::new(options).load_optional(args.config.as_deref())?;
    describe_metrics();

    let (events, mut rx) = EventSink::channel();
    let navigated = Arc::new(Notify::new());
    let navigator = TerminalNavigator::new(args.open, Arc::clone(&navigated));
    let sequencer = StageSequencer::new(loaded.config, events.clone(), Arc::new(navigator));

    let noise_token = CancellationToken::new();
    let _noise = args
        .noise
        .then(|| spawn_noise(NoiseFeed::new(noise_seed()), events.clone(), &noise_token));
    drop(events);

    let mut output = Output::new(args.format, color);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut waiting = Waiting::Nothing;

    sequencer.start();
    info!(gated = sequencer.config().processing.gate.enabled, "playback started");

    let result = loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                break Err(AkashicError::Aborted("interrupted".into()));
            }

            event = rx.recv() => {
                let Some(event) = event else {
                    break Err(AkashicError::Aborted("event stream closed".into()));
                };
                output.render(&event)?;
                match event {
                    SequenceEvent::StageChanged { to: Stage::AwaitingInput, .. } => {
                        if let Some(query) = &args.query {
                            sequencer.submit(query);
                        } else {
                            output.prompt(QUERY_PROMPT)?;
                            waiting = Waiting::Query;
                        }
                    }
                    SequenceEvent::GateRaised => {
                        if args.auto_override {
                            sequencer.override_gate();
                        } else {
                            output.prompt(OVERRIDE_PROMPT)?;
                            waiting = Waiting::Override;
                        }
                    }
                    SequenceEvent::Redirect { .. } => {
                        navigated.notified().await;
                        break Ok(());
                    }
                    _ => {}
                }
            }

            line = stdin.next_line(), if waiting != Waiting::Nothing => {
                let Some(line) = line? else {
                    break Err(AkashicError::Aborted(match waiting {
                        Waiting::Query => "stdin closed before a query was submitted".into(),
                        _ => "stdin closed while the gate was raised".into(),
                    }));
                };
                match waiting {
                    Waiting::Query => {
                        if sequencer.submit(&line) {
                            waiting = Waiting::Nothing;
                        } else {
                            output.prompt(QUERY_PROMPT)?;
                        }
                    }
                    Waiting::Override => {
                        if sequencer.override_gate() {
                            waiting = Waiting::Nothing;
                        }
                    }
                    Waiting::Nothing => {}
                }
            }
        }
    };

    noise_token.cancel();
    sequencer.teardown();
    result
}

fn noise_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() ^ u64::from(d.subsec_nanos()))
}

// ============================================================================
// Navigation
// ============================================================================

/// Signals the command loop and optionally hands the URL to the platform
/// browser launcher.
#[derive(Debug)]
pub struct TerminalNavigator {
    open: bool,
    navigated: Arc<Notify>,
}

impl TerminalNavigator {
    /// Creates a navigator that notifies `navigated` once per URL.
    #[must_use]
    pub const fn new(open: bool, navigated: Arc<Notify>) -> Self {
        Self { open, navigated }
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, url: &str) {
        if self.open {
            let (program, argv) = opener(url);
            let _ = launch(program, &argv);
        }
        self.navigated.notify_one();
    }
}

/// Spawns `program` detached from our stdio and waits for it on a
/// background task so it is reaped once it exits.
fn launch(program: &'static str, argv: &[String]) -> Option<JoinHandle<Option<ExitStatus>>> {
    let mut child = match tokio::process::Command::new(program)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(program, error = %e, "failed to launch browser");
            return None;
        }
    };
    debug!(program, pid = child.id(), "browser launcher spawned");
    Some(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                debug!(program, %status, "browser launcher exited");
                Some(status)
            }
            Err(e) => {
                warn!(program, error = %e, "failed to wait for browser launcher");
                None
            }
        }
    }))
}

#[cfg(target_os = "macos")]
fn opener(url: &str) -> (&'static str, Vec<String>) {
    ("open", vec![url.to_string()])
}

#[cfg(target_os = "windows")]
fn opener(url: &str) -> (&'static str, Vec<String>) {
    // `start` runs under cmd, where `&` separates commands.
    (
        "cmd",
        vec!["/C".into(), "start".into(), String::new(), url.replace('&', "^&")],
    )
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener(url: &str) -> (&'static str, Vec<String>) {
    ("xdg-open", vec![url.to_string()])
}

// ============================================================================
// Rendering
// ============================================================================

enum Output {
    Human(HumanRenderer<std::io::Stdout>),
    Json(EventEmitter),
}

impl Output {
    fn new(format: OutputFormat, color: ColorChoice) -> Self {
        match format {
            OutputFormat::Human => {
                let enabled = color_enabled(color, Stream::Stdout);
                Self::Human(HumanRenderer::new(std::io::stdout(), enabled))
            }
            OutputFormat::Json => Self::Json(EventEmitter::stdout()),
        }
    }

    fn render(&mut self, event: &SequenceEvent) -> std::io::Result<()> {
        match self {
            Self::Human(r) => r.render(event),
            Self::Json(e) => {
                e.emit(event);
                Ok(())
            }
        }
    }

    fn prompt(&mut self, text: &str) -> std::io::Result<()> {
        match self {
            Self::Human(r) => r.prompt(text),
            Self::Json(_) => Ok(()),
        }
    }
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

/// Plain-text rendering of the event stream.
///
/// Typewriter lines are printed whole once they finish.
pub struct HumanRenderer<W: Write> {
    out: W,
    color: bool,
    typing: HashMap<usize, String>,
}

impl<W: Write> HumanRenderer<W> {
    /// Creates a renderer writing to `out`, with ANSI colors if `color`.
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            typing: HashMap::new(),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Renders one event.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn render(&mut self, event: &SequenceEvent) -> std::io::Result<()> {
        match event {
            SequenceEvent::StageChanged { to, .. } => self.banner(*to)?,
            SequenceEvent::TypewriterTick { line, visible } => {
                self.typing.insert(*line, visible.clone());
            }
            SequenceEvent::TypewriterComplete { line } => {
                let text = self.typing.remove(line).unwrap_or_default();
                self.line(GREEN, &text)?;
            }
            SequenceEvent::LogAppended { text, class, .. } => {
                let style = match class {
                    LineClass::Normal => GREEN,
                    LineClass::Warning => YELLOW,
                    LineClass::Error => RED,
                };
                self.line(style, text)?;
            }
            SequenceEvent::GateRaised | SequenceEvent::GateCleared => {}
            SequenceEvent::NoiseLine { text } => self.line(DIM, text)?,
            SequenceEvent::Redirect { url } => self.line(BOLD, &format!("=> {url}"))?,
        }
        self.out.flush()
    }

    /// Writes `text` without a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn prompt(&mut self, text: &str) -> std::io::Result<()> {
        if self.color {
            write!(self.out, "{BOLD}{text}{RESET}")?;
        } else {
            write!(self.out, "{text}")?;
        }
        self.out.flush()
    }

    fn banner(&mut self, stage: Stage) -> std::io::Result<()> {
        let lines: &[&str] = match stage {
            Stage::Intro => &["LOCKED", "SYSTEM INITIALIZATION..."],
            Stage::Scanning => &["[ BIOMETRIC SCAN ]"],
            Stage::AccessGranted => &["ACCESS GRANTED", "系统已准备好回答你的一切问题。"],
            Stage::AwaitingInput => &["这里有你想知道的一切答案"],
            Stage::Processing => &["已连接至量子核心", "CALCULATING TRUTH..."],
            Stage::Redirecting => &["真相已解密", ">> 警告: 正在为你揭示终极答案..."],
        };
        writeln!(self.out)?;
        for text in lines {
            self.line(BOLD, text)?;
        }
        Ok(())
    }

    fn line(&mut self, style: &str, text: &str) -> std::io::Result<()> {
        if self.color {
            writeln!(self.out, "{style}{text}{RESET}")
        } else {
            writeln!(self.out, "{text}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_all(events: &[SequenceEvent], color: bool) -> String {
        let mut r = HumanRenderer::new(Vec::new(), color);
        for e in events {
            r.render(e).unwrap();
        }
        String::from_utf8(r.into_inner()).unwrap()
    }

    #[test]
    fn typewriter_lines_print_once_complete() {
        let out = render_all(
            &[
                SequenceEvent::TypewriterTick {
                    line: 0,
                    visible: "a".into(),
                },
                SequenceEvent::TypewriterTick {
                    line: 0,
                    visible: "ab".into(),
                },
                SequenceEvent::TypewriterComplete { line: 0 },
            ],
            false,
        );
        assert_eq!(out, "ab\n");
    }

    #[test]
    fn log_lines_are_colored_by_class() {
        let out = render_all(
            &[SequenceEvent::LogAppended {
                index: 0,
                text: "警告".into(),
                class: LineClass::Warning,
            }],
            true,
        );
        assert_eq!(out, format!("{YELLOW}警告{RESET}\n"));
    }

    #[test]
    fn redirect_prints_url() {
        let out = render_all(
            &[SequenceEvent::Redirect {
                url: "https://cn.bing.com/search?q=x&settheme=dark".into(),
            }],
            false,
        );
        assert_eq!(out, "=> https://cn.bing.com/search?q=x&settheme=dark\n");
    }

    #[test]
    fn stage_banners() {
        let out = render_all(
            &[SequenceEvent::StageChanged {
                from: None,
                to: Stage::Intro,
            }],
            false,
        );
        assert!(out.contains("LOCKED"));
    }

    #[tokio::test]
    async fn navigator_notifies_without_opening() {
        let navigated = Arc::new(Notify::new());
        let nav = TerminalNavigator::new(false, Arc::clone(&navigated));
        nav.navigate("https://example.com");
        navigated.notified().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launched_process_is_reaped() {
        let waiter = launch("true", &[]).unwrap();
        let status = waiter.await.unwrap().unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn missing_launcher_is_logged_not_fatal() {
        assert!(launch("akashic-no-such-opener", &[]).is_none());
    }

    #[tokio::test]
    async fn blank_query_is_a_usage_error() {
        let args = RunArgs {
            config: None,
            query: Some("  ".into()),
            gated: false,
            auto_override: false,
            pace: None,
            format: OutputFormat::Json,
            noise: false,
            open: false,
        };
        let err = run(&args, ColorChoice::Never, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AkashicError::Usage(_)));
    }
}
