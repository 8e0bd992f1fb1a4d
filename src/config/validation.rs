//! Configuration validation
//!
//! Semantic checks on a deserialized [`SequenceConfig`]. Validation collects
//! ALL issues instead of stopping at the first one.

use std::time::Duration;

use crate::config::schema::SequenceConfig;
use crate::error::ValidationIssue;
use crate::sequence::delay::DelayPolicy;

/// Smallest accepted `pace`.
pub const MIN_PACE: f64 = 1e-4;

/// Largest accepted `pace`.
pub const MAX_PACE: f64 = 1e3;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every error and warning.
    pub fn validate(&mut self, config: &SequenceConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_pace(config.pace);
        self.validate_scan(config);
        self.validate_processing(config);
        self.validate_redirect(config);
        if self.errors.is_empty() {
            self.validate_paced(config);
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn validate_pace(&mut self, pace: f64) {
        if !pace.is_finite() || pace <= 0.0 {
            self.error("pace", format!("must be a positive number, got {pace}"));
        } else if !(MIN_PACE..=MAX_PACE).contains(&pace) {
            self.error("pace", format!("must be between {MIN_PACE} and {MAX_PACE}, got {pace}"));
        }
    }

    /// Delays that must stay non-zero must still be non-zero once `pace`
    /// is applied, and every paced delay must fit in a [`Duration`].
    fn validate_paced(&mut self, config: &SequenceConfig) {
        let paced = match config.paced() {
            Ok(paced) => paced,
            Err(issue) => {
                self.errors.push(issue);
                return;
            }
        };
        let pace = config.pace;
        if paced.scan.emphasis_interval.is_zero() {
            self.error("scan.emphasis_interval", format!("rounds to zero at pace {pace}"));
        }
        if !paced.scan.preamble.is_empty() && paced.scan.preamble_interval.is_zero() {
            self.error("scan.preamble_interval", format!("rounds to zero at pace {pace}"));
        }
        let p = &paced.processing;
        let policies = if p.gate.enabled {
            vec![
                ("processing.gate.segment_one_policy", &p.gate.segment_one_policy),
                ("processing.gate.segment_two_policy", &p.gate.segment_two_policy),
            ]
        } else {
            vec![("processing.simple.policy", &p.simple.policy)]
        };
        for (path, policy) in policies {
            if matches!(policy, DelayPolicy::Accelerating { .. }) && policy.min_delay().is_zero() {
                self.error(path, format!("floor rounds to zero at pace {pace}"));
            }
        }
    }

    fn validate_scan(&mut self, config: &SequenceConfig) {
        if config.scan.emphasis.is_empty() {
            self.error("scan.emphasis", "must not be empty");
        }
        if config.scan.emphasis_interval.is_zero() {
            self.error("scan.emphasis_interval", "must be greater than zero");
        }
        if config.scan.preamble.is_empty() {
            self.warning("scan.preamble", "no preamble lines; only the emphasis line is typed");
        } else if config.scan.preamble_interval.is_zero() {
            self.error("scan.preamble_interval", "must be greater than zero");
        }
    }

    fn validate_processing(&mut self, config: &SequenceConfig) {
        let p = &config.processing;
        if p.gate.enabled {
            if p.gate.segment_one.is_empty() {
                self.error("processing.gate.segment_one", "must contain at least one line");
            }
            if p.gate.segment_two.is_empty() {
                self.error("processing.gate.segment_two", "must contain at least one line");
            }
            if p.gate.acknowledgment.trim().is_empty() {
                self.warning("processing.gate.acknowledgment", "acknowledgment line is blank");
            }
            self.validate_policy("processing.gate.segment_one_policy", &p.gate.segment_one_policy);
            self.validate_policy("processing.gate.segment_two_policy", &p.gate.segment_two_policy);
        } else {
            if p.simple.script.is_empty() {
                self.error("processing.simple.script", "must contain at least one line");
            }
            self.validate_policy("processing.simple.policy", &p.simple.policy);
        }
    }

    fn validate_policy(&mut self, path: &str, policy: &DelayPolicy) {
        match *policy {
            DelayPolicy::Fixed { delay } => {
                if delay.is_zero() {
                    self.warning(path, "zero delay reveals the whole segment at once");
                }
            }
            DelayPolicy::Accelerating { base, floor, .. } => {
                if floor == Duration::ZERO {
                    self.error(path, "floor must be greater than zero");
                }
                if base < floor {
                    self.warning(path, "base is below floor; every line uses the floor");
                }
            }
        }
    }

    fn validate_redirect(&mut self, config: &SequenceConfig) {
        let r = &config.redirect;
        if r.host.trim().is_empty() {
            self.error("redirect.host", "must not be empty");
        } else if r.host.contains("://") {
            self.error("redirect.host", "must be a bare host; the scheme is always https");
        } else if r.host.contains(['/', '?', '#', ' ']) {
            self.error("redirect.host", "must not contain a path, query, or whitespace");
        }
        if r.theme_param.trim().is_empty() {
            self.error("redirect.theme_param", "must not be empty");
        }
    }
}
