//! # OrbitDSP
//!
//! Spacecraft sensor/actuator simulation for telemetry demos: a noisy sensor
//! signal is synthesized, filtered and checked for faults once per tick, while
//! a burn/fuel model tracks thruster propellant. A coarse health code is sent
//! to a companion status indicator whenever it changes.
//!
//! ## Features
//!
//! - **Deterministic noise**: vibration, jitter and spikes from a seeded LCG
//! - **Filter bank**: EMA, single-pole low-pass and moving median
//! - **Fault handling**: injected faults with expiry plus saturation and
//!   out-of-range auto-detection
//! - **Burn/fuel model**: linear depletion with automatic stop
//! - **Transport agnostic**: time, status, telemetry and events go through
//!   small capability traits
//!
//! ## Quick Start
//!
//! ```rust
//! use orbitdsp::ports::{DspPorts, ManualClock, Recorder};
//! use orbitdsp::status::HealthStatus;
//! use orbitdsp::DspEngine;
//!
//! let clock = ManualClock::new(0);
//! let status: Recorder<HealthStatus> = Recorder::new();
//! let mut engine = DspEngine::new(DspPorts::new(clock.clone()).with_status(status.clone()));
//!
//! engine.start_burn(1.0, 2_000);
//! for _ in 0..10 {
//!     engine.tick();
//!     clock.advance_ms(20);
//! }
//!
//! assert!(engine.burn().fuel_kg < 10.0);
//! assert_eq!(status.entries(), vec![HealthStatus::Nominal]);
//! ```
//!
//! ## Architecture
//!
//! - [`engine`] - Tick orchestrator and command dispatch
//! - [`median`] - Fixed-capacity ring buffer with median
//! - [`filter`] - Selectable filter bank
//! - [`signal`] - Signal synthesis and noise injection
//! - [`fault`] - Fault tracking, expiry and history
//! - [`status`] - Health status derivation and edge-triggered publishing
//! - [`propulsion`] - Burn/fuel model
//! - [`scheduler`] - Tick timing
//! - [`ports`] - Capability interfaces and in-memory implementations
//! - [`telemetry`] - Telemetry snapshot and events
//! - [`protocol`] - JSON line protocol
//! - [`config`] - Simulator daemon configuration

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod engine;
pub mod fault;
pub mod filter;
pub mod median;
pub mod ports;
pub mod propulsion;
pub mod protocol;
pub mod scheduler;
pub mod signal;
pub mod status;
pub mod telemetry;

// Re-export main public types for convenience
pub use engine::DspEngine;
pub use fault::FaultType;
pub use filter::{FilterKind, FilterSettings};
pub use protocol::{Command, CommandType};
pub use signal::{NoiseConfig, Scenario};
pub use status::HealthStatus;
pub use telemetry::TelemetrySnapshot;
