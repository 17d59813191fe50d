use crate::fault::FaultType;
use crate::filter::{FilterKind, FilterSettings};
use crate::signal::{NoiseConfig, Scenario};
use crate::telemetry::TelemetrySnapshot;
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_COMMAND_SIZE: usize = 512;
pub const MAX_RESPONSE_SIZE: usize = 1024;

pub type CommandBuffer = ArrayString<MAX_COMMAND_SIZE>;
pub type ResponseBuffer = ArrayString<MAX_RESPONSE_SIZE>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u32,
    pub command_type: CommandType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandType {
    Ping,
    SetScenario {
        scenario: Scenario,
    },
    SetFilter {
        filter_type: FilterKind,
        ema_alpha: f32,
        median_win: u32,
        lpf_cutoff_hz: f32,
    },
    SetNoise {
        vib_amp: f32,
        vib_hz: f32,
        spike_rate: f32,
        rand_sigma: f32,
    },
    InjectFault {
        fault_type: FaultType,
        duration_ms: u32,
        /// Carried for compatibility with ground tooling; unused.
        #[serde(default)]
        level: f32,
    },
    SetFuel {
        fuel_kg: f32,
    },
    StartBurn {
        burn_rate_kg_s: f32,
        duration_ms: u32,
    },
    StopBurn,
    SetMeas {
        value: f32,
    },
    ResetDemo,
}

impl CommandType {
    pub fn filter_settings(&self) -> Option<FilterSettings> {
        match *self {
            CommandType::SetFilter { filter_type, ema_alpha, median_win, lpf_cutoff_hz } => Some(FilterSettings {
                kind: filter_type,
                ema_alpha,
                median_window: median_win,
                lpf_cutoff_hz,
            }),
            _ => None,
        }
    }

    pub fn noise_config(&self) -> Option<NoiseConfig> {
        match *self {
            CommandType::SetNoise { vib_amp, vib_hz, spike_rate, rand_sigma } => Some(NoiseConfig {
                vib_amp,
                vib_hz,
                spike_rate,
                rand_sigma,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: u32,
    pub timestamp_usec: u64,
    pub status: ResponseStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    NegativeAck,
    InvalidCommand,
    ParseError,
}

/// Everything the simulator writes back to a client, one per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    Telemetry(TelemetrySnapshot),
    Response(CommandResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    InvalidJson,
    #[error("Message exceeds buffer size")]
    MessageTooLarge,
    #[error("Serialization failed")]
    SerializationError,
    #[error("Invalid command")]
    InvalidCommand,
}

/// Bounded line codec for commands and responses.
#[derive(Debug)]
pub struct ProtocolHandler {
    command_buffer: CommandBuffer,
    response_buffer: ResponseBuffer,
    command_counter: u32,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            command_buffer: ArrayString::new(),
            response_buffer: ArrayString::new(),
            command_counter: 0,
        }
    }

    pub fn parse_command(&mut self, line: &str) -> Result<Command, ProtocolError> {
        self.command_buffer.clear();
        let line = line.trim();
        self.command_buffer
            .try_push_str(line)
            .map_err(|_| ProtocolError::MessageTooLarge)?;

        serde_json::from_str::<Command>(&self.command_buffer).map_err(|_| ProtocolError::InvalidJson)
    }

    pub fn serialize_message(&mut self, message: &ServerMessage) -> Result<&str, ProtocolError> {
        self.response_buffer.clear();

        let json = serde_json::to_string(message).map_err(|_| ProtocolError::SerializationError)?;
        self.response_buffer
            .try_push_str(&json)
            .map_err(|_| ProtocolError::MessageTooLarge)?;

        Ok(&self.response_buffer)
    }

    pub fn validate_command(&self, command: &Command) -> Result<(), ProtocolError> {
        if command.id == 0 {
            return Err(ProtocolError::InvalidCommand);
        }
        Ok(())
    }

    pub fn next_command_id(&mut self) -> u32 {
        self.command_counter = self.command_counter.wrapping_add(1);
        if self.command_counter == 0 {
            self.command_counter = 1;
        }
        self.command_counter
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_response(id: u32, timestamp_usec: u64, status: ResponseStatus, message: Option<&str>) -> CommandResponse {
    CommandResponse {
        id,
        timestamp_usec,
        status,
        message: message.map(ToString::to_string),
    }
}
