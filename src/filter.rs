//! Selectable single-input single-output filter bank.
//!
//! Three filters are available: an exponential moving average, a single-pole
//! low-pass driven by the per-tick `dt`, and a moving median over the
//! [`RingMedianBuffer`]. Reconfiguring always discards runtime history.

use crate::median::RingMedianBuffer;
use core::f32::consts::PI;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMA_ALPHA: f32 = 0.1;
pub const DEFAULT_MEDIAN_WINDOW: u32 = 5;
pub const DEFAULT_LPF_CUTOFF_HZ: f32 = 1.0;

/// Cutoff substituted when the configured one is not positive.
pub const MIN_LPF_CUTOFF_HZ: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterKind {
    Ema,
    Median,
    #[serde(alias = "LPF")]
    LowPass,
}

impl FilterKind {
    pub fn code(self) -> u8 {
        match self {
            FilterKind::Ema => 1,
            FilterKind::Median => 2,
            FilterKind::LowPass => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FilterKind::Ema),
            2 => Some(FilterKind::Median),
            3 => Some(FilterKind::LowPass),
            _ => None,
        }
    }
}

impl core::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FilterKind::Ema => write!(f, "EMA"),
            FilterKind::Median => write!(f, "MEDIAN"),
            FilterKind::LowPass => write!(f, "LPF"),
        }
    }
}

/// Operator-facing filter configuration.
///
/// All three parameters are stored regardless of the selected kind; values
/// are only range-checked at the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub kind: FilterKind,
    pub ema_alpha: f32,
    pub median_window: u32,
    pub lpf_cutoff_hz: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            kind: FilterKind::Ema,
            ema_alpha: DEFAULT_EMA_ALPHA,
            median_window: DEFAULT_MEDIAN_WINDOW,
            lpf_cutoff_hz: DEFAULT_LPF_CUTOFF_HZ,
        }
    }
}

/// Runtime state of the active filter.
#[derive(Debug, Clone)]
enum FilterStage {
    Ema { state: f32 },
    LowPass { state: f32 },
    Median(RingMedianBuffer),
}

impl FilterStage {
    fn for_kind(kind: FilterKind) -> Self {
        match kind {
            FilterKind::Ema => FilterStage::Ema { state: 0.0 },
            FilterKind::LowPass => FilterStage::LowPass { state: 0.0 },
            FilterKind::Median => FilterStage::Median(RingMedianBuffer::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterBank {
    settings: FilterSettings,
    stage: FilterStage,
    initialized: bool,
}

impl FilterBank {
    pub fn new(settings: FilterSettings) -> Self {
        Self {
            settings,
            stage: FilterStage::for_kind(settings.kind),
            initialized: false,
        }
    }

    /// Replace the configuration and drop all history.
    pub fn configure(&mut self, settings: FilterSettings) {
        self.settings = settings;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.stage = FilterStage::for_kind(self.settings.kind);
        self.initialized = false;
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn kind(&self) -> FilterKind {
        self.settings.kind
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Filter one raw sample taken `dt` seconds after the previous one.
    pub fn apply(&mut self, x: f32, dt: f32) -> f32 {
        let seed = !self.initialized;
        self.initialized = true;

        match &mut self.stage {
            FilterStage::Ema { state } => {
                if seed {
                    *state = x;
                }
                let alpha = self.settings.ema_alpha.clamp(0.0, 1.0);
                *state = alpha * x + (1.0 - alpha) * *state;
                *state
            }
            FilterStage::LowPass { state } => {
                if seed {
                    *state = x;
                }
                let k = low_pass_gain(self.settings.lpf_cutoff_hz, dt);
                *state += k * (x - *state);
                *state
            }
            FilterStage::Median(buffer) => {
                buffer.push(x);
                buffer.median(self.settings.median_window).unwrap_or(x)
            }
        }
    }
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::new(FilterSettings::default())
    }
}

/// Blend factor `dt / (rc + dt)` of the one-pole low-pass.
pub fn low_pass_gain(cutoff_hz: f32, dt: f32) -> f32 {
    let fc = if cutoff_hz <= 0.0 { MIN_LPF_CUTOFF_HZ } else { cutoff_hz };
    let rc = 1.0 / (2.0 * PI * fc);
    dt / (rc + dt)
}
