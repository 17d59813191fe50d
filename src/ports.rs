//! Capability interfaces the engine depends on.
//!
//! The engine never talks to a transport directly. It reads time from a
//! [`TimeSource`] and hands status codes, telemetry and events to sinks, so
//! the same core runs under the TCP daemon, in replay and in tests.

use crate::status::HealthStatus;
use crate::telemetry::{DspEvent, EventSeverity, TelemetrySnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Seconds plus microseconds, as delivered by the host clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub seconds: u32,
    pub useconds: u32,
}

impl Timestamp {
    pub fn new(seconds: u32, useconds: u32) -> Self {
        Self { seconds, useconds }
    }

    /// Saturates at `u32::MAX` seconds rather than wrapping.
    pub fn from_micros(usec: u64) -> Self {
        Self {
            seconds: u32::try_from(usec / 1_000_000).unwrap_or(u32::MAX),
            useconds: (usec % 1_000_000) as u32,
        }
    }

    pub fn as_micros(self) -> u64 {
        u64::from(self.seconds) * 1_000_000 + u64::from(self.useconds)
    }
}

pub trait TimeSource: Send {
    fn now(&self) -> Timestamp;
}

pub trait StatusSink: Send {
    fn send_status(&mut self, status: HealthStatus);
}

pub trait TelemetrySink: Send {
    fn publish(&mut self, snapshot: &TelemetrySnapshot);
}

pub trait EventSink: Send {
    fn emit(&mut self, event: &DspEvent);
}

/// Wall clock time since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::new(elapsed.as_secs() as u32, elapsed.subsec_micros())
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    usec: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_usec: u64) -> Self {
        Self {
            usec: Arc::new(AtomicU64::new(start_usec)),
        }
    }

    pub fn set_micros(&self, usec: u64) {
        self.usec.store(usec, Ordering::SeqCst);
    }

    pub fn advance_micros(&self, usec: u64) {
        self.usec.fetch_add(usec, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_micros(ms * 1000);
    }

    pub fn micros(&self) -> u64 {
        self.usec.load(Ordering::SeqCst)
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.micros())
    }
}

/// In-memory sink that keeps everything it receives. Clones share storage.
#[derive(Debug)]
pub struct Recorder<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Recorder<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn entries(&self) -> Vec<T> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<T> {
        self.entries.lock().ok().and_then(|e| e.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn push(&self, entry: T) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: Clone> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for Recorder<HealthStatus> {
    fn send_status(&mut self, status: HealthStatus) {
        self.push(status);
    }
}

impl TelemetrySink for Recorder<TelemetrySnapshot> {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) {
        self.push(snapshot.clone());
    }
}

impl EventSink for Recorder<DspEvent> {
    fn emit(&mut self, event: &DspEvent) {
        self.push(event.clone());
    }
}

/// Discards telemetry and events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&mut self, _snapshot: &TelemetrySnapshot) {}
}

impl EventSink for NullSink {
    fn emit(&mut self, _event: &DspEvent) {}
}

/// Routes events to `tracing` at a level matching their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&mut self, event: &DspEvent) {
        match event.severity() {
            EventSeverity::WarningHigh => warn!(target: "orbitdsp::events", "{}", event),
            EventSeverity::ActivityHigh => info!(target: "orbitdsp::events", "{}", event),
            EventSeverity::ActivityLow => debug!(target: "orbitdsp::events", "{}", event),
        }
    }
}

/// Everything the engine talks to.
pub struct DspPorts {
    pub clock: Box<dyn TimeSource>,
    /// `None` while no status indicator is connected.
    pub status: Option<Box<dyn StatusSink>>,
    pub telemetry: Box<dyn TelemetrySink>,
    pub events: Box<dyn EventSink>,
}

impl DspPorts {
    /// Ports with the given clock, no indicator, discarded telemetry and
    /// events logged through `tracing`.
    pub fn new(clock: impl TimeSource + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            status: None,
            telemetry: Box::new(NullSink),
            events: Box::new(TracingEventSink),
        }
    }

    pub fn with_status(mut self, sink: impl StatusSink + 'static) -> Self {
        self.status = Some(Box::new(sink));
        self
    }

    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Box::new(sink);
        self
    }

    pub fn with_events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Box::new(sink);
        self
    }
}

impl core::fmt::Debug for DspPorts {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DspPorts")
            .field("status_connected", &self.status.is_some())
            .finish_non_exhaustive()
    }
}
