use crate::fault::FaultType;
use crate::ports::StatusSink;
use crate::signal::NoiseConfig;
use serde::{Deserialize, Serialize};

/// Coarse health code sent to the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Fault,
    Nominal,
    Noisy,
    Error,
    /// One-shot marker sent on first entry into the burn monitor scenario.
    Start,
}

impl HealthStatus {
    pub fn code(self) -> u8 {
        match self {
            HealthStatus::Fault => 0,
            HealthStatus::Nominal => 1,
            HealthStatus::Noisy => 2,
            HealthStatus::Error => 3,
            HealthStatus::Start => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(HealthStatus::Fault),
            1 => Some(HealthStatus::Nominal),
            2 => Some(HealthStatus::Noisy),
            3 => Some(HealthStatus::Error),
            4 => Some(HealthStatus::Start),
            _ => None,
        }
    }

    /// Letter blinked by the indicator.
    pub fn letter(self) -> char {
        match self {
            HealthStatus::Fault => 'F',
            HealthStatus::Nominal => 'T',
            HealthStatus::Noisy => 'N',
            HealthStatus::Error => 'E',
            HealthStatus::Start => 'S',
        }
    }

    /// International Morse code for [`Self::letter`].
    pub fn morse(self) -> &'static str {
        match self {
            HealthStatus::Fault => "..-.",
            HealthStatus::Nominal => "-",
            HealthStatus::Noisy => "-.",
            HealthStatus::Error => ".",
            HealthStatus::Start => "...",
        }
    }
}

impl core::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.letter(), self.code())
    }
}

pub fn fault_status(fault: FaultType) -> HealthStatus {
    match fault {
        FaultType::None => HealthStatus::Nominal,
        FaultType::SaturateHigh | FaultType::SaturateLow | FaultType::Dropout => HealthStatus::Fault,
        FaultType::StuckAt | FaultType::OutOfRange => HealthStatus::Error,
    }
}

/// Status implied by the current fault and noise configuration.
pub fn derive_status(fault: FaultType, noise: &NoiseConfig) -> HealthStatus {
    if fault.is_active() {
        fault_status(fault)
    } else if noise.is_noisy() {
        HealthStatus::Noisy
    } else {
        HealthStatus::Nominal
    }
}

/// Edge-triggered publisher for the status indicator.
#[derive(Debug, Default)]
pub struct StatusEdge {
    last_sent: Option<HealthStatus>,
    start_marker_sent: bool,
}

impl StatusEdge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sent(&self) -> Option<HealthStatus> {
        self.last_sent
    }

    pub fn start_marker_sent(&self) -> bool {
        self.start_marker_sent
    }

    /// Forget the last sent status so the next publish goes out.
    pub fn force(&mut self) {
        self.last_sent = None;
    }

    /// Send `status` unless it matches the last one delivered. Nothing is
    /// remembered when no indicator is connected. Returns whether it was sent.
    pub fn publish(&mut self, status: HealthStatus, sink: Option<&mut (dyn StatusSink + 'static)>) -> bool {
        if self.last_sent == Some(status) {
            return false;
        }
        match sink {
            Some(sink) => {
                sink.send_status(status);
                self.last_sent = Some(status);
                true
            }
            None => false,
        }
    }

    /// Claim the one-shot start marker. Returns false if it was already used.
    pub fn take_start_marker(&mut self) -> bool {
        if self.start_marker_sent {
            return false;
        }
        self.start_marker_sent = true;
        true
    }

    /// Re-arm the start marker and force the next publish.
    pub fn rearm(&mut self) {
        self.start_marker_sent = false;
        self.last_sent = None;
    }
}
