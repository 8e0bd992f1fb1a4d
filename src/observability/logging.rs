//! Logging initialization.
//!
//! Logs go to stderr so they never interleave with the rendered sequence on
//! stdout. `-v` raises the level for this crate only; `AKASHIC_LOG_LEVEL`
//! replaces the whole filter.
//!
//! # Color
//!
//! The log layer and the human renderer in `run` share [`color_enabled`]:
//!
//! | `--color` | stream is a TTY | `NO_COLOR` set and non-empty | ANSI |
//! |-----------|-----------------|------------------------------|------|
//! | `always`  | any             | any                          | yes  |
//! | `never`   | any             | any                          | no   |
//! | `auto`    | no              | any                          | no   |
//! | `auto`    | yes             | yes                          | no   |
//! | `auto`    | yes             | no (or empty)                | yes  |
//!
//! Each stream is checked separately, so `akashic run | less` keeps colored
//! logs on a terminal stderr while stdout stays plain.

use std::ffi::OsStr;
use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity-derived filter.
pub const LOG_LEVEL_ENV: &str = "AKASHIC_LOG_LEVEL";

/// Environment variable that disables automatic color (<https://no-color.org>).
pub const NO_COLOR_ENV: &str = "NO_COLOR";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Standard stream a writer targets, for color detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Rendered sequence output.
    Stdout,
    /// Logs.
    Stderr,
}

impl Stream {
    fn is_terminal(self) -> bool {
        match self {
            Self::Stdout => std::io::stdout().is_terminal(),
            Self::Stderr => std::io::stderr().is_terminal(),
        }
    }
}

/// Filter directive for a `-v` count. Dependencies stay at `warn` until
/// `-vvv`.
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,akashic=info",
        2 => "warn,akashic=debug",
        _ => "trace",
    }
}

/// Decides whether `stream` gets ANSI escapes under `choice`, reading
/// `NO_COLOR` from the environment.
#[must_use]
pub fn color_enabled(choice: ColorChoice, stream: Stream) -> bool {
    resolve_color(
        choice,
        stream.is_terminal(),
        std::env::var_os(NO_COLOR_ENV).as_deref(),
    )
}

/// Pure form of [`color_enabled`].
///
/// An empty `NO_COLOR` does not disable color.
#[must_use]
pub fn resolve_color(choice: ColorChoice, is_terminal: bool, no_color: Option<&OsStr>) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => is_terminal && no_color.is_none_or(OsStr::is_empty),
    }
}

/// Initializes the global tracing subscriber.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));
    let show_target = verbosity >= 2;

    let installed = match format {
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(color_enabled(color, Stream::Stderr))
            .with_target(show_target)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(show_target)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok(),
    };
    if installed {
        tracing::debug!(?format, verbosity, "logging initialized");
    }
}
