use serde::{Deserialize, Serialize};

pub const DEFAULT_FUEL_KG: f32 = 10.0;

/// What happened to the burn during one `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnUpdate {
    Idle,
    Burning,
    /// Time expired or the tank ran dry; the burn is now inactive.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnState {
    pub active: bool,
    pub rate_kg_s: f32,
    pub end_time_usec: u64,
    pub fuel_kg: f32,
}

/// Linear fuel depletion over a bounded burn.
#[derive(Debug, Clone)]
pub struct BurnModel {
    state: BurnState,
}

impl BurnModel {
    pub fn new() -> Self {
        Self {
            state: BurnState {
                active: false,
                rate_kg_s: 0.0,
                end_time_usec: 0,
                fuel_kg: DEFAULT_FUEL_KG,
            },
        }
    }

    pub fn state(&self) -> &BurnState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn fuel_kg(&self) -> f32 {
        self.state.fuel_kg
    }

    pub fn rate_kg_s(&self) -> f32 {
        self.state.rate_kg_s
    }

    /// Negative amounts are treated as an empty tank.
    pub fn set_fuel(&mut self, fuel_kg: f32) {
        self.state.fuel_kg = fuel_kg.max(0.0);
    }

    /// Arm a burn. It only becomes active when both rate and duration are
    /// positive; otherwise the record is kept but nothing is consumed.
    pub fn start(&mut self, rate_kg_s: f32, duration_ms: u32, now_usec: u64) {
        self.state.rate_kg_s = rate_kg_s.max(0.0);
        self.state.active = duration_ms > 0 && self.state.rate_kg_s > 0.0;
        self.state.end_time_usec = now_usec + u64::from(duration_ms) * 1000;
    }

    pub fn stop(&mut self) {
        self.state.active = false;
        self.state.rate_kg_s = 0.0;
        self.state.end_time_usec = 0;
    }

    pub fn advance(&mut self, now_usec: u64, dt: f32) -> BurnUpdate {
        if !self.state.active {
            return BurnUpdate::Idle;
        }

        if now_usec >= self.state.end_time_usec || self.state.fuel_kg <= 0.0 {
            self.halt();
            return BurnUpdate::Stopped;
        }

        let consumed = self.state.rate_kg_s * dt;
        self.state.fuel_kg = if self.state.fuel_kg > consumed {
            self.state.fuel_kg - consumed
        } else {
            0.0
        };

        if self.state.fuel_kg <= 0.0 {
            self.halt();
            return BurnUpdate::Stopped;
        }

        debug_assert!(self.state.fuel_kg > 0.0);
        BurnUpdate::Burning
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // Automatic stop keeps the scheduled end time for telemetry.
    fn halt(&mut self) {
        self.state.active = false;
        self.state.rate_kg_s = 0.0;
    }
}

impl Default for BurnModel {
    fn default() -> Self {
        Self::new()
    }
}
