use crate::fault::FaultType;
use crate::filter::FilterKind;
use crate::ports::TelemetrySink;
use crate::signal::Scenario;
use serde::{Deserialize, Serialize};

/// Telemetry channels, refreshed within the tick or setter that changes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub timestamp_usec: u64,
    pub scenario: u8,
    pub filter_type: u8,
    pub fault_code: u8,
    pub spike_count: u32,
    pub raw_value: f32,
    pub filtered_value: f32,
    pub noise_metric: f32,
    pub fuel_kg: f32,
    pub burn_active: bool,
    pub burn_rate_kg_s: f32,
    pub meas_value: f32,
}

impl TelemetrySnapshot {
    pub fn scenario(&self) -> Option<Scenario> {
        Scenario::from_code(self.scenario)
    }

    pub fn filter_kind(&self) -> Option<FilterKind> {
        FilterKind::from_code(self.filter_type)
    }

    pub fn fault(&self) -> Option<FaultType> {
        FaultType::from_code(self.fault_code)
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            timestamp_usec: 0,
            scenario: Scenario::default().code(),
            filter_type: FilterKind::Ema.code(),
            fault_code: FaultType::None.code(),
            spike_count: 0,
            raw_value: 0.0,
            filtered_value: 0.0,
            noise_metric: 0.0,
            fuel_kg: crate::propulsion::DEFAULT_FUEL_KG,
            burn_active: false,
            burn_rate_kg_s: 0.0,
            meas_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    ActivityHigh,
    ActivityLow,
    WarningHigh,
}

/// Informational events raised by commands and fault bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DspEvent {
    ScenarioSet(Scenario),
    FilterSet(FilterKind),
    NoiseSet { vib_amp: f32, vib_hz: f32, spike_rate: f32, rand_sigma: f32 },
    FaultInjected { fault_type: FaultType, duration_ms: u32, level: f32 },
    FaultCleared(FaultType),
    FuelSet(f32),
    BurnStarted { rate_kg_s: f32, duration_ms: u32 },
    BurnStopped,
    MeasSet(f32),
    DemoReset,
}

impl DspEvent {
    pub fn severity(&self) -> EventSeverity {
        match self {
            DspEvent::FaultInjected { .. } => EventSeverity::WarningHigh,
            DspEvent::MeasSet(_) => EventSeverity::ActivityLow,
            _ => EventSeverity::ActivityHigh,
        }
    }
}

impl core::fmt::Display for DspEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DspEvent::ScenarioSet(s) => write!(f, "Scenario set to {}", s),
            DspEvent::FilterSet(k) => write!(f, "Filter set to {}", k),
            DspEvent::NoiseSet { vib_amp, vib_hz, spike_rate, rand_sigma } => write!(
                f,
                "Noise: amp={} hz={} spikeRate={} sigma={}",
                vib_amp, vib_hz, spike_rate, rand_sigma
            ),
            DspEvent::FaultInjected { fault_type, duration_ms, level } => write!(
                f,
                "Fault: type={} duration_ms={} level={}",
                fault_type, duration_ms, level
            ),
            DspEvent::FaultCleared(t) => write!(f, "Fault cleared: {}", t),
            DspEvent::FuelSet(kg) => write!(f, "Fuel set to {} kg", kg),
            DspEvent::BurnStarted { rate_kg_s, duration_ms } => write!(
                f,
                "Burn started: rate={} kg/s duration_ms={}",
                rate_kg_s, duration_ms
            ),
            DspEvent::BurnStopped => write!(f, "Burn stopped"),
            DspEvent::MeasSet(v) => write!(f, "Measurement set: {}", v),
            DspEvent::DemoReset => write!(f, "Demo state reset"),
        }
    }
}

/// Passes every `every`-th snapshot, for downlinks slower than the tick.
#[derive(Debug, Clone)]
pub struct TelemetryDecimator {
    every: u32,
    counter: u32,
}

impl TelemetryDecimator {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            counter: 0,
        }
    }

    pub fn should_emit(&mut self) -> bool {
        let emit = self.counter == 0;
        self.counter = (self.counter + 1) % self.every;
        emit
    }
}

/// Tick-driven telemetry forwarding. Only the tick loop feeds it, so
/// snapshots published by setters never shift the decimation phase; their
/// changes go out with the next forwarded tick.
pub struct TickDownlink<S> {
    sink: S,
    decimator: TelemetryDecimator,
}

impl<S: TelemetrySink> TickDownlink<S> {
    pub fn new(sink: S, every: u32) -> Self {
        Self {
            sink,
            decimator: TelemetryDecimator::new(every),
        }
    }

    /// Returns whether this tick's snapshot was forwarded.
    pub fn on_tick(&mut self, snapshot: &TelemetrySnapshot) -> bool {
        if !self.decimator.should_emit() {
            return false;
        }
        self.sink.publish(snapshot);
        true
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
