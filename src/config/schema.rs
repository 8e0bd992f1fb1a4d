//! Configuration schema
//!
//! Every field has a default, so an empty YAML document (or no file at all)
//! yields the stock narrative. Durations accept `humantime` strings or
//! integer milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration;
use crate::error::ValidationIssue;
use crate::sequence::delay::{DelayPolicy, scale};
use crate::sequence::log_player::{PlayerMode, PlayerSettings};
use crate::sequence::redirect::RedirectTarget;

// ============================================================================
// Root
// ============================================================================

/// Complete sequence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Intro splash.
    pub intro: IntroConfig,
    /// Scan stage typewriters.
    pub scan: ScanConfig,
    /// Access-granted banner.
    pub access: AccessConfig,
    /// Processing log scripts.
    pub processing: ProcessingConfig,
    /// Final redirect.
    pub redirect: RedirectConfig,
    /// Multiplier applied to every delay (`1.0` = as written).
    pub pace: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            intro: IntroConfig::default(),
            scan: ScanConfig::default(),
            access: AccessConfig::default(),
            processing: ProcessingConfig::default(),
            redirect: RedirectConfig::default(),
            pace: 1.0,
        }
    }
}

impl SequenceConfig {
    /// Returns a copy with every delay multiplied by `pace` and `pace`
    /// reset to `1.0`, so the result can be handed straight to the
    /// sequencer.
    ///
    /// # Errors
    ///
    /// Returns the first field whose paced value does not fit in a
    /// [`Duration`].
    pub fn paced(&self) -> Result<Self, ValidationIssue> {
        let f = self.pace;
        let d = |path: &str, value: Duration| {
            scale(value, f).ok_or_else(|| overflow(path, f))
        };
        let p = |path: &str, policy: &DelayPolicy| policy.scaled(f).ok_or_else(|| overflow(path, f));
        let g = &self.processing.gate;
        let s = &self.processing.simple;
        Ok(Self {
            intro: IntroConfig {
                delay: d("intro.delay", self.intro.delay)?,
            },
            scan: ScanConfig {
                preamble: self.scan.preamble.clone(),
                preamble_interval: d("scan.preamble_interval", self.scan.preamble_interval)?,
                emphasis: self.scan.emphasis.clone(),
                emphasis_interval: d("scan.emphasis_interval", self.scan.emphasis_interval)?,
            },
            access: AccessConfig {
                delay: d("access.delay", self.access.delay)?,
            },
            processing: ProcessingConfig {
                system_marker: self.processing.system_marker.clone(),
                user_marker: self.processing.user_marker.clone(),
                simple: SimpleScriptConfig {
                    script: s.script.clone(),
                    policy: p("processing.simple.policy", &s.policy)?,
                    settle: d("processing.simple.settle", s.settle)?,
                },
                gate: GateConfig {
                    enabled: g.enabled,
                    segment_one: g.segment_one.clone(),
                    segment_one_policy: p("processing.gate.segment_one_policy", &g.segment_one_policy)?,
                    acknowledgment: g.acknowledgment.clone(),
                    acknowledgment_delay: d("processing.gate.acknowledgment_delay", g.acknowledgment_delay)?,
                    segment_two: g.segment_two.clone(),
                    segment_two_policy: p("processing.gate.segment_two_policy", &g.segment_two_policy)?,
                    settle: d("processing.gate.settle", g.settle)?,
                },
            },
            redirect: RedirectConfig {
                delay: d("redirect.delay", self.redirect.delay)?,
                ..self.redirect.clone()
            },
            pace: 1.0,
        })
    }
}

fn overflow(path: &str, pace: f64) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        message: format!("does not fit in a duration at pace {pace}"),
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Intro splash settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroConfig {
    /// Time before the scan begins.
    #[serde(with = "duration")]
    pub delay: Duration,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1500),
        }
    }
}

/// Scan stage settings.
///
/// The preamble lines are typed concurrently for show. Only the emphasis
/// line gates the transition to `AccessGranted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Cosmetic lines typed before the emphasis line.
    pub preamble: Vec<String>,
    /// Interval between preamble characters.
    #[serde(with = "duration")]
    pub preamble_interval: Duration,
    /// Emphasis line; its completion ends the scan.
    pub emphasis: String,
    /// Interval between emphasis characters.
    #[serde(with = "duration")]
    pub emphasis_interval: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preamble: vec![
                "> 启动生物特征识别...".to_string(),
                "> 扫描视网膜纹理...".to_string(),
                "> 匹配阿卡西数据库...".to_string(),
            ],
            preamble_interval: Duration::from_millis(15),
            emphasis: "> 目标确认: 熊雨贤".to_string(),
            emphasis_interval: Duration::from_millis(50),
        }
    }
}

/// Access-granted banner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Time before the query prompt appears.
    #[serde(with = "duration")]
    pub delay: Duration,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(2500),
        }
    }
}

// ============================================================================
// Processing
// ============================================================================

/// Processing log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Prefix for scripted lines.
    pub system_marker: String,
    /// Prefix for the override acknowledgment.
    pub user_marker: String,
    /// Single-segment script, used when the gate is disabled.
    pub simple: SimpleScriptConfig,
    /// Two-segment script with a manual override between segments.
    pub gate: GateConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            system_marker: "> [SYSTEM]: ".to_string(),
            user_marker: "> [USER]: ".to_string(),
            simple: SimpleScriptConfig::default(),
            gate: GateConfig::default(),
        }
    }
}

impl ProcessingConfig {
    /// Builds log player settings for whichever variant is enabled.
    #[must_use]
    pub fn player_settings(&self) -> PlayerSettings {
        let mode = if self.gate.enabled {
            let g = &self.gate;
            PlayerMode::Gated {
                segment_one: g.segment_one.clone(),
                segment_one_policy: g.segment_one_policy,
                acknowledgment: g.acknowledgment.clone(),
                acknowledgment_delay: g.acknowledgment_delay,
                segment_two: g.segment_two.clone(),
                segment_two_policy: g.segment_two_policy,
                settle: g.settle,
            }
        } else {
            PlayerMode::Simple {
                script: self.simple.script.clone(),
                policy: self.simple.policy,
                settle: self.simple.settle,
            }
        };
        PlayerSettings {
            mode,
            system_marker: self.system_marker.clone(),
            user_marker: self.user_marker.clone(),
        }
    }
}

/// Single-segment script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleScriptConfig {
    /// Lines in reveal order.
    pub script: Vec<String>,
    /// Per-line delay.
    pub policy: DelayPolicy,
    /// Pause after the last line.
    #[serde(with = "duration")]
    pub settle: Duration,
}

impl Default for SimpleScriptConfig {
    fn default() -> Self {
        let mut script = segment_one_lines();
        script.extend(segment_two_lines());
        Self {
            script,
            policy: DelayPolicy::accelerating_ms(400, 30, 50),
            settle: Duration::from_millis(600),
        }
    }
}

/// Gated two-segment script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Use this variant instead of the simple script.
    pub enabled: bool,
    /// Lines revealed before the gate.
    pub segment_one: Vec<String>,
    /// Per-line delay before the gate.
    pub segment_one_policy: DelayPolicy,
    /// Line appended (with the user marker) when the override fires.
    pub acknowledgment: String,
    /// Pause between the acknowledgment and segment two.
    #[serde(with = "duration")]
    pub acknowledgment_delay: Duration,
    /// Lines revealed after the override.
    pub segment_two: Vec<String>,
    /// Per-line delay after the override.
    pub segment_two_policy: DelayPolicy,
    /// Pause after the last line of segment two.
    #[serde(with = "duration")]
    pub settle: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        let mut segment_one = segment_one_lines();
        segment_one.push("警告: 检测到量子防火墙反制, 需要人工授权".to_string());
        Self {
            enabled: false,
            segment_one,
            segment_one_policy: DelayPolicy::fixed(Duration::from_millis(350)),
            acknowledgment: "MANUAL OVERRIDE ACCEPTED, 强制继续".to_string(),
            acknowledgment_delay: Duration::from_millis(500),
            segment_two: segment_two_lines(),
            segment_two_policy: DelayPolicy::accelerating_ms(400, 30, 50),
            settle: Duration::from_millis(1200),
        }
    }
}

fn segment_one_lines() -> Vec<String> {
    [
        "正在连接 Akashic (阿卡西) 记录...",
        "目标锁定: 熊雨贤 (XIONG_YUXIAN)",
        "正在暴力破解逻辑防火墙...",
        "绕过大脑皮层防御机制...",
        "ROOT ACCESS: ACQUIRED",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn segment_two_lines() -> Vec<String> {
    [
        "下载神经元记忆碎片 (42TB)...",
        "正在通过量子算法解析因果律...",
        "警告: 检索到 1 个终极答案",
        "系统过载: 真相即将溢出",
        ">> 准备注入现实 <<",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// ============================================================================
// Redirect
// ============================================================================

/// Redirect settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Time spent on the redirect screen before navigating.
    #[serde(with = "duration")]
    pub delay: Duration,
    /// Search engine host.
    pub host: String,
    /// Name of the theme query parameter.
    pub theme_param: String,
    /// Value of the theme query parameter.
    pub theme_value: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(3000),
            host: "cn.bing.com".to_string(),
            theme_param: "settheme".to_string(),
            theme_value: "dark".to_string(),
        }
    }
}

impl RedirectConfig {
    /// Returns the URL template parameters.
    #[must_use]
    pub fn target(&self) -> RedirectTarget {
        RedirectTarget {
            host: self.host.clone(),
            theme_param: self.theme_param.clone(),
            theme_value: self.theme_value.clone(),
        }
    }
}
