use crate::signal::ClipBound;
use heapless::Vec;
use serde::{Deserialize, Serialize};

const MAX_FAULT_HISTORY: usize = 32;

/// Magnitude above which an unclipped sample is flagged out of range.
pub const OUT_OF_RANGE_THRESHOLD: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultType {
    #[default]
    None,
    SaturateHigh,
    SaturateLow,
    StuckAt,
    OutOfRange,
    Dropout,
}

impl FaultType {
    pub fn code(self) -> u8 {
        match self {
            FaultType::None => 0,
            FaultType::SaturateHigh => 1,
            FaultType::SaturateLow => 2,
            FaultType::StuckAt => 3,
            FaultType::OutOfRange => 4,
            FaultType::Dropout => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FaultType::None),
            1 => Some(FaultType::SaturateHigh),
            2 => Some(FaultType::SaturateLow),
            3 => Some(FaultType::StuckAt),
            4 => Some(FaultType::OutOfRange),
            5 => Some(FaultType::Dropout),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        self != FaultType::None
    }
}

impl core::fmt::Display for FaultType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            FaultType::None => "NONE",
            FaultType::SaturateHigh => "SATURATE_HIGH",
            FaultType::SaturateLow => "SATURATE_LOW",
            FaultType::StuckAt => "STUCK_AT",
            FaultType::OutOfRange => "OUT_OF_RANGE",
            FaultType::Dropout => "DROPOUT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultOrigin {
    Injected,
    AutoDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultResolution {
    Expired,
    Cleared,
    Overridden,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRecord {
    pub id: u32,
    pub fault_type: FaultType,
    pub origin: FaultOrigin,
    pub raised_at_usec: u64,
    pub resolved_at_usec: Option<u64>,
    pub resolution: Option<FaultResolution>,
}

/// Bounded history of raised faults, oldest evicted first.
#[derive(Debug)]
pub struct FaultLog {
    history: Vec<FaultRecord, MAX_FAULT_HISTORY>,
    next_fault_id: u32,
}

impl FaultLog {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            next_fault_id: 1,
        }
    }

    pub fn record(&mut self, fault_type: FaultType, origin: FaultOrigin, timestamp_usec: u64) -> u32 {
        let id = self.next_fault_id;
        self.next_fault_id = self.next_fault_id.wrapping_add(1);

        if self.history.is_full() {
            self.history.remove(0);
        }

        let _ = self.history.push(FaultRecord {
            id,
            fault_type,
            origin,
            raised_at_usec: timestamp_usec,
            resolved_at_usec: None,
            resolution: None,
        });
        id
    }

    /// Close every open record.
    pub fn resolve_open(&mut self, resolution: FaultResolution, timestamp_usec: u64) {
        for record in self.history.iter_mut().filter(|r| r.resolved_at_usec.is_none()) {
            record.resolved_at_usec = Some(timestamp_usec);
            record.resolution = Some(resolution);
        }
    }

    pub fn open_faults(&self) -> impl Iterator<Item = &FaultRecord> {
        self.history.iter().filter(|r| r.resolved_at_usec.is_none())
    }

    pub fn history(&self) -> &[FaultRecord] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.next_fault_id = 1;
    }
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Single active fault with optional expiry.
///
/// An end time of zero means the fault holds until it is overwritten or
/// cleared by the operator.
#[derive(Debug)]
pub struct FaultMonitor {
    active: FaultType,
    end_time_usec: u64,
    log: FaultLog,
}

impl FaultMonitor {
    pub fn new() -> Self {
        Self {
            active: FaultType::None,
            end_time_usec: 0,
            log: FaultLog::new(),
        }
    }

    pub fn active(&self) -> FaultType {
        self.active
    }

    pub fn end_time_usec(&self) -> u64 {
        self.end_time_usec
    }

    pub fn log(&self) -> &FaultLog {
        &self.log
    }

    /// Operator injection. Always overwrites the current fault.
    pub fn inject(&mut self, fault_type: FaultType, duration_ms: u32, now_usec: u64) {
        if self.active.is_active() {
            let resolution = if fault_type.is_active() {
                FaultResolution::Overridden
            } else {
                FaultResolution::Cleared
            };
            self.log.resolve_open(resolution, now_usec);
        }

        self.active = fault_type;
        self.end_time_usec = if duration_ms == 0 || !fault_type.is_active() {
            0
        } else {
            now_usec + u64::from(duration_ms) * 1000
        };

        if fault_type.is_active() {
            self.log.record(fault_type, FaultOrigin::Injected, now_usec);
        }
    }

    /// Flag saturation or out-of-range samples, but only while no fault is
    /// already active. Returns the newly raised fault.
    pub fn auto_detect(&mut self, raw: f32, clipped: Option<ClipBound>, now_usec: u64) -> Option<FaultType> {
        if self.active.is_active() {
            return None;
        }

        let detected = match clipped {
            Some(ClipBound::High) => FaultType::SaturateHigh,
            Some(ClipBound::Low) => FaultType::SaturateLow,
            None if raw.abs() > OUT_OF_RANGE_THRESHOLD => FaultType::OutOfRange,
            None => return None,
        };

        self.active = detected;
        self.end_time_usec = 0;
        self.log.record(detected, FaultOrigin::AutoDetected, now_usec);
        Some(detected)
    }

    /// Revert a timed fault whose end time has been reached. Returns the
    /// fault that was cleared.
    pub fn expire(&mut self, now_usec: u64) -> Option<FaultType> {
        if !self.active.is_active() || self.end_time_usec == 0 || now_usec < self.end_time_usec {
            return None;
        }

        let previous = self.active;
        self.active = FaultType::None;
        self.end_time_usec = 0;
        self.log.resolve_open(FaultResolution::Expired, now_usec);
        Some(previous)
    }

    pub fn reset(&mut self) {
        self.active = FaultType::None;
        self.end_time_usec = 0;
        self.log.clear();
    }
}

impl Default for FaultMonitor {
    fn default() -> Self {
        Self::new()
    }
}
