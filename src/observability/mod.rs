//! Observability module
//!
//! Logging, metrics, and the structured event stream that hosts render.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{EventEmitter, EventSink, SequenceEvent};
pub use logging::{LogFormat, init_logging};
pub use metrics::describe_metrics;
