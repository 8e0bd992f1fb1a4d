//! Sequence metrics.
//!
//! Counters are recorded through the `metrics` facade. Without an installed
//! recorder they are no-ops, so the core never depends on an exporter.

use metrics::{counter, describe_counter};

use crate::sequence::log_player::LineClass;
use crate::sequence::stage::Stage;

/// Stage transitions, labelled by the stage entered.
pub const STAGE_TRANSITIONS: &str = "akashic_stage_transitions_total";

/// Lines appended to the processing log, labelled by class.
pub const LOG_LINES: &str = "akashic_log_lines_total";

/// Redirects handed to the navigator.
pub const REDIRECTS: &str = "akashic_redirects_total";

/// Registers metric descriptions with whatever recorder is installed.
pub fn describe_metrics() {
    describe_counter!(STAGE_TRANSITIONS, "Stage transitions by entered stage");
    describe_counter!(LOG_LINES, "Processing log lines appended by class");
    describe_counter!(REDIRECTS, "Redirect URLs handed to the navigator");
}

/// Records entry into `stage`.
pub fn record_stage(stage: Stage) {
    counter!(STAGE_TRANSITIONS, "stage" => stage.as_str()).increment(1);
}

/// Records an appended log line.
pub fn record_log_line(class: LineClass) {
    counter!(LOG_LINES, "class" => class.as_str()).increment(1);
}

/// Records an issued redirect.
pub fn record_redirect() {
    counter!(REDIRECTS).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        describe_metrics();
        record_stage(Stage::Intro);
        record_log_line(LineClass::Error);
        record_redirect();
    }
}
