use crate::fault::{FaultMonitor, FaultRecord, FaultType};
use crate::filter::{FilterBank, FilterSettings};
use crate::ports::DspPorts;
use crate::propulsion::{BurnModel, BurnState, BurnUpdate};
use crate::protocol::{create_response, Command, CommandResponse, CommandType, ResponseStatus};
use crate::scheduler::TickTimer;
use crate::signal::{NoiseConfig, Scenario, SignalSample, SignalSynthesizer};
use crate::status::{derive_status, HealthStatus, StatusEdge};
use crate::telemetry::{DspEvent, TelemetrySnapshot};
use tracing::{debug, trace};

/// The per-tick simulation engine.
///
/// Owns all simulation state. Configuration setters and [`DspEngine::tick`]
/// must be called from one logical thread of control; none of them block.
pub struct DspEngine {
    ports: DspPorts,

    scenario: Scenario,
    filter: FilterBank,
    noise: NoiseConfig,
    synthesizer: SignalSynthesizer,
    faults: FaultMonitor,
    burn: BurnModel,
    meas_value: f32,

    status_edge: StatusEdge,
    timer: TickTimer,
    last_sample: Option<SignalSample>,
    telemetry: TelemetrySnapshot,
}

impl DspEngine {
    pub fn new(ports: DspPorts) -> Self {
        let mut engine = Self {
            ports,
            scenario: Scenario::BurnMonitor,
            filter: FilterBank::default(),
            noise: NoiseConfig::default(),
            synthesizer: SignalSynthesizer::new(),
            faults: FaultMonitor::new(),
            burn: BurnModel::new(),
            meas_value: 0.0,
            status_edge: StatusEdge::new(),
            timer: TickTimer::new(),
            last_sample: None,
            telemetry: TelemetrySnapshot::default(),
        };
        engine.publish_telemetry(0);
        engine
    }

    /// Run one simulation step.
    pub fn tick(&mut self) {
        let now = self.now_usec();
        let dt = self.timer.next_dt(now);

        if let Some(cleared) = self.faults.expire(now) {
            self.emit(DspEvent::FaultCleared(cleared));
        }

        let sample = self
            .synthesizer
            .synthesize(now, dt, self.scenario, self.meas_value, &self.noise);

        if let Some(detected) = self.faults.auto_detect(sample.raw, sample.clipped, now) {
            debug!(fault = %detected, raw = sample.raw, "auto-detected fault");
        }

        let filtered = self.filter.apply(sample.raw, dt);

        if self.scenario == Scenario::BurnMonitor && self.burn.advance(now, dt) == BurnUpdate::Stopped {
            debug!(fuel_kg = self.burn.fuel_kg(), "burn finished");
        }

        self.telemetry.raw_value = sample.raw;
        self.telemetry.filtered_value = filtered;
        self.telemetry.noise_metric = sample.noise.abs();
        self.last_sample = Some(sample);
        self.publish_telemetry(now);

        trace!(dt, raw = sample.raw, filtered, "tick");

        self.publish_status();
    }

    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
        self.emit(DspEvent::ScenarioSet(scenario));
        self.refresh_telemetry();

        if scenario == Scenario::BurnMonitor && self.status_edge.take_start_marker() {
            self.status_edge.force();
            self.send_status(HealthStatus::Start);
            return;
        }

        self.publish_status();
    }

    pub fn set_filter(&mut self, settings: FilterSettings) {
        self.filter.configure(settings);
        self.emit(DspEvent::FilterSet(settings.kind));
        self.refresh_telemetry();
        self.publish_status();
    }

    pub fn set_noise(&mut self, noise: NoiseConfig) {
        self.noise = noise;
        self.emit(DspEvent::NoiseSet {
            vib_amp: noise.vib_amp,
            vib_hz: noise.vib_hz,
            spike_rate: noise.spike_rate,
            rand_sigma: noise.rand_sigma,
        });
        self.publish_status();
    }

    /// Overwrite the active fault. A zero duration holds until changed;
    /// injecting [`FaultType::None`] clears and forces a status resend.
    pub fn inject_fault(&mut self, fault_type: FaultType, duration_ms: u32, level: f32) {
        let now = self.now_usec();
        self.faults.inject(fault_type, duration_ms, now);
        self.emit(DspEvent::FaultInjected { fault_type, duration_ms, level });
        self.refresh_telemetry();

        if !fault_type.is_active() {
            self.status_edge.force();
        }
        self.publish_status();
    }

    pub fn set_fuel(&mut self, fuel_kg: f32) {
        self.burn.set_fuel(fuel_kg);
        self.emit(DspEvent::FuelSet(self.burn.fuel_kg()));
        self.refresh_telemetry();
        self.publish_status();
    }

    pub fn start_burn(&mut self, rate_kg_s: f32, duration_ms: u32) {
        let now = self.now_usec();
        self.burn.start(rate_kg_s, duration_ms, now);
        self.emit(DspEvent::BurnStarted {
            rate_kg_s: self.burn.rate_kg_s(),
            duration_ms,
        });
        self.refresh_telemetry();
        self.publish_status();
    }

    pub fn stop_burn(&mut self) {
        self.burn.stop();
        self.emit(DspEvent::BurnStopped);
        self.refresh_telemetry();
        self.publish_status();
    }

    /// External input for the IMU stream scenario. Does not touch status.
    pub fn set_measurement(&mut self, value: f32) {
        self.meas_value = value;
        self.emit(DspEvent::MeasSet(value));
        self.refresh_telemetry();
    }

    /// Restore startup defaults, re-arm the start marker and push a fresh
    /// status. Scenario and tick timing are kept.
    pub fn reset_demo(&mut self) {
        self.faults.reset();
        self.noise = NoiseConfig::default();
        self.filter.configure(FilterSettings::default());
        self.burn.reset();
        self.meas_value = 0.0;
        self.synthesizer.reset();
        self.last_sample = None;

        self.status_edge.rearm();
        self.refresh_telemetry();
        self.publish_status();

        self.emit(DspEvent::DemoReset);
    }

    /// Apply a protocol command and acknowledge it.
    pub fn execute(&mut self, command: &Command) -> CommandResponse {
        let now = self.now_usec();

        if command.id == 0 {
            return create_response(
                command.id,
                now,
                ResponseStatus::NegativeAck,
                Some("Command id must be non-zero"),
            );
        }

        match &command.command_type {
            CommandType::Ping => {}
            CommandType::SetScenario { scenario } => self.set_scenario(*scenario),
            CommandType::SetFilter { .. } => {
                if let Some(settings) = command.command_type.filter_settings() {
                    self.set_filter(settings);
                }
            }
            CommandType::SetNoise { .. } => {
                if let Some(noise) = command.command_type.noise_config() {
                    self.set_noise(noise);
                }
            }
            CommandType::InjectFault { fault_type, duration_ms, level } => {
                self.inject_fault(*fault_type, *duration_ms, *level);
            }
            CommandType::SetFuel { fuel_kg } => self.set_fuel(*fuel_kg),
            CommandType::StartBurn { burn_rate_kg_s, duration_ms } => {
                self.start_burn(*burn_rate_kg_s, *duration_ms);
            }
            CommandType::StopBurn => self.stop_burn(),
            CommandType::SetMeas { value } => self.set_measurement(*value),
            CommandType::ResetDemo => self.reset_demo(),
        }

        create_response(command.id, now, ResponseStatus::Success, None)
    }

    /// Status implied by the current fault and noise configuration.
    pub fn status(&self) -> HealthStatus {
        derive_status(self.faults.active(), &self.noise)
    }

    pub fn last_sent_status(&self) -> Option<HealthStatus> {
        self.status_edge.last_sent()
    }

    pub fn telemetry(&self) -> &TelemetrySnapshot {
        &self.telemetry
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn filter_settings(&self) -> &FilterSettings {
        self.filter.settings()
    }

    pub fn noise(&self) -> &NoiseConfig {
        &self.noise
    }

    pub fn fault(&self) -> FaultType {
        self.faults.active()
    }

    pub fn fault_end_time_usec(&self) -> u64 {
        self.faults.end_time_usec()
    }

    pub fn fault_history(&self) -> &[FaultRecord] {
        self.faults.log().history()
    }

    pub fn burn(&self) -> &BurnState {
        self.burn.state()
    }

    pub fn measurement(&self) -> f32 {
        self.meas_value
    }

    pub fn spike_count(&self) -> u32 {
        self.synthesizer.spike_count()
    }

    pub fn rng_state(&self) -> u32 {
        self.synthesizer.rng().state()
    }

    pub fn last_sample(&self) -> Option<&SignalSample> {
        self.last_sample.as_ref()
    }

    pub fn tick_count(&self) -> u64 {
        self.timer.tick_count()
    }

    /// Attach or detach the status indicator.
    pub fn connect_status(&mut self, sink: Option<Box<dyn crate::ports::StatusSink>>) {
        self.ports.status = sink;
    }

    fn now_usec(&self) -> u64 {
        self.ports.clock.now().as_micros()
    }

    fn emit(&mut self, event: DspEvent) {
        self.ports.events.emit(&event);
    }

    fn publish_status(&mut self) {
        let status = self.status();
        self.send_status(status);
    }

    fn send_status(&mut self, status: HealthStatus) {
        if self.status_edge.publish(status, self.ports.status.as_deref_mut()) {
            debug!(%status, "status published");
        }
    }

    fn refresh_telemetry(&mut self) {
        let now = self.now_usec();
        self.publish_telemetry(now);
    }

    fn publish_telemetry(&mut self, now_usec: u64) {
        let burn = self.burn.state();
        self.telemetry.timestamp_usec = now_usec;
        self.telemetry.scenario = self.scenario.code();
        self.telemetry.filter_type = self.filter.kind().code();
        self.telemetry.fault_code = self.faults.active().code();
        self.telemetry.spike_count = self.synthesizer.spike_count();
        self.telemetry.fuel_kg = burn.fuel_kg;
        self.telemetry.burn_active = burn.active;
        self.telemetry.burn_rate_kg_s = burn.rate_kg_s;
        self.telemetry.meas_value = self.meas_value;
        self.ports.telemetry.publish(&self.telemetry);
    }
}

impl core::fmt::Debug for DspEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DspEngine")
            .field("scenario", &self.scenario)
            .field("filter", self.filter.settings())
            .field("noise", &self.noise)
            .field("fault", &self.faults.active())
            .field("burn", self.burn.state())
            .field("ports", &self.ports)
            .finish()
    }
}
