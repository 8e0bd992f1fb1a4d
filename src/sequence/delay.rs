//! Per-line delay policies for the log player.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration;

/// How long to wait before revealing the line at a given index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayPolicy {
    /// The same delay before every line.
    Fixed {
        /// Delay before each line.
        #[serde(with = "duration")]
        delay: Duration,
    },
    /// `max(floor, base - index * step)`: lines arrive faster as the
    /// script progresses, never faster than `floor`.
    Accelerating {
        /// Delay before the first line.
        #[serde(with = "duration")]
        base: Duration,
        /// Reduction applied per line index.
        #[serde(with = "duration")]
        step: Duration,
        /// Lower clamp.
        #[serde(with = "duration")]
        floor: Duration,
    },
}

impl DelayPolicy {
    /// Fixed policy with the given delay.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    /// Accelerating policy from millisecond values.
    #[must_use]
    pub const fn accelerating_ms(base: u64, step: u64, floor: u64) -> Self {
        Self::Accelerating {
            base: Duration::from_millis(base),
            step: Duration::from_millis(step),
            floor: Duration::from_millis(floor),
        }
    }

    /// Returns the delay preceding the line at `index`.
    #[must_use]
    pub fn delay_for(&self, index: usize) -> Duration {
        match *self {
            Self::Fixed { delay } => delay,
            Self::Accelerating { base, step, floor } => {
                let index = u32::try_from(index).unwrap_or(u32::MAX);
                base.saturating_sub(step.saturating_mul(index)).max(floor)
            }
        }
    }

    /// Returns a copy with every duration multiplied by `factor`, or `None`
    /// if any product is not representable.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Option<Self> {
        Some(match *self {
            Self::Fixed { delay } => Self::Fixed {
                delay: scale(delay, factor)?,
            },
            Self::Accelerating { base, step, floor } => Self::Accelerating {
                base: scale(base, factor)?,
                step: scale(step, factor)?,
                floor: scale(floor, factor)?,
            },
        })
    }

    /// The smallest delay this policy can produce.
    #[must_use]
    pub const fn min_delay(&self) -> Duration {
        match *self {
            Self::Fixed { delay } => delay,
            Self::Accelerating { floor, .. } => floor,
        }
    }
}

/// Multiplies `d` by `factor` without panicking on overflow, NaN, or a
/// negative factor.
#[must_use]
pub fn scale(d: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(d.as_secs_f64() * factor).ok()
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::accelerating_ms(400, 30, 50)
    }
}
