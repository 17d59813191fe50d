//! Sensor signal synthesis and noise injection.
//!
//! Everything random in the simulator comes from one [`Lcg`] owned by the
//! [`SignalSynthesizer`], so a fixed seed reproduces a run bit for bit.

use core::f32::consts::PI;
use serde::{Deserialize, Serialize};

/// Seed used at startup and after a demo reset.
pub const RNG_SEED: u32 = 0x1234_5678;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;
const U32_MAX_F32: f32 = 4_294_967_295.0;

/// Phase wraps every ten seconds.
const PHASE_PERIOD_USEC: u64 = 10_000_000;
const BURN_SIGNAL_AMPLITUDE: f32 = 0.5;
const BURN_SIGNAL_HZ: f32 = 0.2;

pub const SPIKE_MAGNITUDE: f32 = 5.0;
pub const CLIP_HIGH: f32 = 3.0;
pub const CLIP_LOW: f32 = -3.0;

/// Which source feeds the "true" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scenario {
    #[default]
    BurnMonitor,
    ImuStream,
}

impl Scenario {
    pub fn code(self) -> u8 {
        match self {
            Scenario::BurnMonitor => 1,
            Scenario::ImuStream => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Scenario::BurnMonitor),
            2 => Some(Scenario::ImuStream),
            _ => None,
        }
    }

    /// Noise-free value at phase `tsec`.
    pub fn true_value(self, tsec: f32, measurement: f32) -> f32 {
        match self {
            Scenario::BurnMonitor => {
                BURN_SIGNAL_AMPLITUDE * (2.0 * PI * BURN_SIGNAL_HZ * tsec).sin()
            }
            Scenario::ImuStream => measurement,
        }
    }
}

impl core::fmt::Display for Scenario {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Scenario::BurnMonitor => write!(f, "BURN_MONITOR"),
            Scenario::ImuStream => write!(f, "IMU_STREAM"),
        }
    }
}

/// Independently zero-able noise sources.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NoiseConfig {
    pub vib_amp: f32,
    pub vib_hz: f32,
    /// Expected spikes per second.
    pub spike_rate: f32,
    pub rand_sigma: f32,
}

impl NoiseConfig {
    /// Whether the configuration alone should report a noisy status.
    pub fn is_noisy(&self) -> bool {
        self.rand_sigma > 5.0 || self.spike_rate > 0.0 || self.vib_amp != 0.0
    }
}

/// 32-bit linear congruential generator (Numerical Recipes constants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }

    /// Uniform draw in `[0, 1]`.
    pub fn uniform(&mut self) -> f32 {
        self.next_u32() as f32 / U32_MAX_F32
    }

    /// Irwin-Hall approximation of a standard normal: six uniforms minus 3.
    pub fn pseudo_gauss(&mut self) -> f32 {
        let mut acc = 0.0_f32;
        for _ in 0..6 {
            acc += self.uniform();
        }
        acc - 3.0
    }
}

impl Default for Lcg {
    fn default() -> Self {
        Self::new(RNG_SEED)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipBound {
    High,
    Low,
}

/// One synthesized sample, before filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalSample {
    pub true_value: f32,
    pub noise: f32,
    /// `true_value + noise`, clipped to the safety band.
    pub raw: f32,
    pub clipped: Option<ClipBound>,
    pub spiked: bool,
}

/// Hard clip to `[CLIP_LOW, CLIP_HIGH]`. NaN collapses to zero.
pub fn clip(x: f32) -> (f32, Option<ClipBound>) {
    if x.is_nan() {
        (0.0, None)
    } else if x > CLIP_HIGH {
        (CLIP_HIGH, Some(ClipBound::High))
    } else if x < CLIP_LOW {
        (CLIP_LOW, Some(ClipBound::Low))
    } else {
        (x, None)
    }
}

/// Fractional seconds within the current ten second phase window.
pub fn phase_seconds(now_usec: u64) -> f32 {
    (now_usec % PHASE_PERIOD_USEC) as f32 / 1_000_000.0
}

#[derive(Debug, Clone)]
pub struct SignalSynthesizer {
    rng: Lcg,
    spike_count: u32,
}

impl SignalSynthesizer {
    pub fn new() -> Self {
        Self {
            rng: Lcg::default(),
            spike_count: 0,
        }
    }

    /// Reseed the generator and zero the spike counter.
    pub fn reset(&mut self) {
        self.rng = Lcg::new(RNG_SEED);
        self.spike_count = 0;
    }

    pub fn spike_count(&self) -> u32 {
        self.spike_count
    }

    pub fn rng(&self) -> &Lcg {
        &self.rng
    }

    /// Produce the raw sample for a tick at `now_usec`, `dt` seconds after
    /// the previous one.
    pub fn synthesize(
        &mut self,
        now_usec: u64,
        dt: f32,
        scenario: Scenario,
        measurement: f32,
        noise_cfg: &NoiseConfig,
    ) -> SignalSample {
        let tsec = phase_seconds(now_usec);
        let true_value = scenario.true_value(tsec, measurement);

        let mut noise = 0.0_f32;

        if noise_cfg.vib_amp != 0.0 && noise_cfg.vib_hz != 0.0 {
            noise += finite_or_zero(noise_cfg.vib_amp * (2.0 * PI * noise_cfg.vib_hz * tsec).sin());
        }

        // Jitter is drawn before the spike decision.
        if noise_cfg.rand_sigma != 0.0 {
            noise += finite_or_zero(noise_cfg.rand_sigma * self.rng.pseudo_gauss());
        }

        let mut spiked = false;
        if noise_cfg.spike_rate > 0.0 {
            let p = noise_cfg.spike_rate * dt;
            if self.rng.uniform() < p {
                noise += SPIKE_MAGNITUDE;
                self.spike_count = self.spike_count.wrapping_add(1);
                spiked = true;
            }
        }

        let (raw, clipped) = clip(true_value + noise);

        SignalSample {
            true_value,
            noise,
            raw,
            clipped,
            spiked,
        }
    }
}

// Overflowing parameters (e.g. 1e39 parsed as infinity) drop their term
// instead of poisoning the filter state.
fn finite_or_zero(term: f32) -> f32 {
    if term.is_finite() {
        term
    } else {
        0.0
    }
}

impl Default for SignalSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_golden_sequence() {
        let mut rng = Lcg::new(RNG_SEED);
        assert_eq!(rng.next_u32(), 1_967_335_287);
        assert_eq!(rng.next_u32(), 3_442_499_178);
        assert_eq!(rng.next_u32(), 635_173_569);
        assert_eq!(rng.next_u32(), 1_264_358_700);
    }

    #[test]
    fn test_pseudo_gauss_golden_value() {
        let mut rng = Lcg::default();
        let g = rng.pseudo_gauss();
        assert!((g - 0.106_271_27).abs() < 1e-6, "got {g}");
        assert_eq!(rng.state(), 3_802_821_438);
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = Lcg::default();
        for _ in 0..1000 {
            let u = rng.uniform();
            assert!((0.0..=1.0).contains(&u));
        }
    }

    #[test]
    fn test_pseudo_gauss_bounded() {
        let mut rng = Lcg::default();
        for _ in 0..1000 {
            let g = rng.pseudo_gauss();
            assert!((-3.0..=3.0).contains(&g));
        }
    }

    #[test]
    fn test_clip_bounds() {
        assert_eq!(clip(4.0), (CLIP_HIGH, Some(ClipBound::High)));
        assert_eq!(clip(-7.5), (CLIP_LOW, Some(ClipBound::Low)));
        assert_eq!(clip(3.0), (3.0, None));
        assert_eq!(clip(0.25), (0.25, None));
    }

    #[test]
    fn test_phase_wraps_every_ten_seconds() {
        assert_eq!(phase_seconds(0), 0.0);
        assert_eq!(phase_seconds(2_500_000), 2.5);
        assert_eq!(phase_seconds(12_500_000), 2.5);
    }

    #[test]
    fn test_quiet_config_does_not_consume_randomness() {
        let mut synth = SignalSynthesizer::new();
        let sample = synth.synthesize(0, 0.02, Scenario::ImuStream, 1.5, &NoiseConfig::default());
        assert_eq!(sample.raw, 1.5);
        assert_eq!(sample.noise, 0.0);
        assert_eq!(synth.rng().state(), RNG_SEED);
    }

    #[test]
    fn test_vibration_requires_amplitude_and_frequency() {
        let mut synth = SignalSynthesizer::new();
        let cfg = NoiseConfig { vib_amp: 1.0, vib_hz: 0.0, ..NoiseConfig::default() };
        let sample = synth.synthesize(1_250_000, 0.02, Scenario::ImuStream, 0.0, &cfg);
        assert_eq!(sample.noise, 0.0);
    }

    #[test]
    fn test_certain_spike_clips_and_counts() {
        let mut synth = SignalSynthesizer::new();
        // p = 100 * 0.02 = 2, every draw triggers
        let cfg = NoiseConfig { spike_rate: 100.0, ..NoiseConfig::default() };
        let sample = synth.synthesize(0, 0.02, Scenario::ImuStream, 0.0, &cfg);
        assert!(sample.spiked);
        assert_eq!(sample.noise, SPIKE_MAGNITUDE);
        assert_eq!(sample.raw, CLIP_HIGH);
        assert_eq!(sample.clipped, Some(ClipBound::High));
        assert_eq!(synth.spike_count(), 1);
    }

    #[test]
    fn test_clip_maps_nan_to_zero() {
        assert_eq!(clip(f32::NAN), (0.0, None));
        assert_eq!(clip(f32::INFINITY), (CLIP_HIGH, Some(ClipBound::High)));
        assert_eq!(clip(f32::NEG_INFINITY), (CLIP_LOW, Some(ClipBound::Low)));
    }

    #[test]
    fn test_overflowing_vibration_is_dropped() {
        let mut synth = SignalSynthesizer::new();
        let cfg = NoiseConfig { vib_amp: 0.1, vib_hz: f32::INFINITY, ..NoiseConfig::default() };
        for now in [0, 20_000, 1_250_000] {
            let sample = synth.synthesize(now, 0.02, Scenario::ImuStream, 0.4, &cfg);
            assert_eq!(sample.noise, 0.0);
            assert_eq!(sample.raw, 0.4);
        }
    }

    #[test]
    fn test_jitter_drawn_before_spike() {
        let mut synth = SignalSynthesizer::new();
        // u7 is about 0.914, so p = 50 * 0.02 = 1.0 fires.
        let cfg = NoiseConfig { rand_sigma: 1.0, spike_rate: 50.0, ..NoiseConfig::default() };
        let sample = synth.synthesize(0, 0.02, Scenario::ImuStream, 0.0, &cfg);

        let expected_jitter = Lcg::new(RNG_SEED).pseudo_gauss();
        assert!(sample.spiked);
        assert!((sample.noise - (expected_jitter + SPIKE_MAGNITUDE)).abs() < 1e-5, "noise={}", sample.noise);
        assert_eq!(synth.rng().state(), 3_926_884_741);
    }

    #[test]
    fn test_scenario_defaults_to_burn_monitor() {
        assert_eq!(Scenario::default(), Scenario::BurnMonitor);
    }

    #[test]
    fn test_reset_reseeds() {
        let mut synth = SignalSynthesizer::new();
        let cfg = NoiseConfig { spike_rate: 100.0, rand_sigma: 1.0, ..NoiseConfig::default() };
        synth.synthesize(0, 0.02, Scenario::BurnMonitor, 0.0, &cfg);
        synth.reset();
        assert_eq!(synth.spike_count(), 0);
        assert_eq!(synth.rng().state(), RNG_SEED);
    }

    #[test]
    fn test_noisy_classification() {
        assert!(!NoiseConfig::default().is_noisy());
        assert!(!NoiseConfig { rand_sigma: 5.0, ..NoiseConfig::default() }.is_noisy());
        assert!(NoiseConfig { rand_sigma: 5.5, ..NoiseConfig::default() }.is_noisy());
        assert!(NoiseConfig { spike_rate: 0.1, ..NoiseConfig::default() }.is_noisy());
        assert!(NoiseConfig { vib_amp: -0.2, ..NoiseConfig::default() }.is_noisy());
    }
}
