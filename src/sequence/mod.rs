//! Presentation sequence
//!
//! A timer-driven stage machine (`Intro` through `Redirecting`) plus the
//! components it orchestrates: scan typewriters, the scripted processing
//! log, and the final redirect.

pub mod delay;
pub mod log_player;
pub mod redirect;
pub mod sequencer;
pub mod stage;
pub mod timer;
pub mod typewriter;

pub use delay::DelayPolicy;
pub use log_player::{InteractionGate, LineClass, LogBuffer, PlayerMode, PlayerPhase, PlayerSettings, ScriptedLogPlayer};
pub use redirect::{RedirectTarget, build_redirect_url, encode_component};
pub use sequencer::{Navigator, RecordingNavigator, StageSequencer};
pub use stage::{Stage, StageEvent};
pub use typewriter::{Completion, RevealCursor, TypewriterRevealer};
