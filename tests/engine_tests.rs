use orbitdsp::fault::FaultType;
use orbitdsp::filter::{FilterKind, FilterSettings};
use orbitdsp::ports::{DspPorts, ManualClock, NullSink, Recorder};
use orbitdsp::protocol::{Command, CommandType, ProtocolHandler, ResponseStatus, ServerMessage};
use orbitdsp::signal::{Lcg, NoiseConfig, Scenario, RNG_SEED, SPIKE_MAGNITUDE};
use orbitdsp::status::HealthStatus;
use orbitdsp::telemetry::{DspEvent, TelemetrySnapshot};
use orbitdsp::DspEngine;

const TICK_MS: u64 = 20;

struct Harness {
    engine: DspEngine,
    clock: ManualClock,
    status: Recorder<HealthStatus>,
    events: Recorder<DspEvent>,
    telemetry: Recorder<TelemetrySnapshot>,
}

impl Harness {
    fn new() -> Self {
        let clock = ManualClock::new(0);
        let status = Recorder::new();
        let events = Recorder::new();
        let telemetry = Recorder::new();
        let engine = DspEngine::new(
            DspPorts::new(clock.clone())
                .with_status(status.clone())
                .with_events(events.clone())
                .with_telemetry(telemetry.clone()),
        );
        Self { engine, clock, status, events, telemetry }
    }

    /// Tick at the current time, then move the clock one period forward.
    fn step(&mut self) {
        self.engine.tick();
        self.clock.advance_ms(TICK_MS);
    }
}

fn noisy(spike_rate: f32, rand_sigma: f32) -> NoiseConfig {
    NoiseConfig { vib_amp: 0.0, vib_hz: 0.0, spike_rate, rand_sigma }
}

#[test]
fn test_burn_runs_dry_and_stops_same_tick() {
    let mut h = Harness::new();
    h.engine.start_burn(2.0, 20_000);
    assert!(h.engine.burn().active);

    let mut ticks = 0;
    while h.engine.burn().active {
        h.step();
        ticks += 1;
        assert!(ticks < 400, "burn never stopped");
    }

    // 10 kg at 2 kg/s is five seconds, far short of the 20 s duration.
    assert!((245..=255).contains(&ticks), "stopped after {} ticks", ticks);
    assert_eq!(h.engine.burn().fuel_kg, 0.0);
    assert_eq!(h.engine.burn().rate_kg_s, 0.0);
    assert!(!h.engine.telemetry().burn_active);
    assert_eq!(h.engine.telemetry().fuel_kg, 0.0);
}

#[test]
fn test_burn_stops_when_duration_elapses() {
    let mut h = Harness::new();
    h.engine.start_burn(0.5, 100);

    for _ in 0..10 {
        h.step();
    }

    assert!(!h.engine.burn().active);
    let fuel = h.engine.burn().fuel_kg;
    assert!(fuel < 10.0 && fuel > 9.9, "fuel {}", fuel);
}

#[test]
fn test_burn_paused_outside_burn_monitor() {
    let mut h = Harness::new();
    h.engine.set_scenario(Scenario::ImuStream);
    h.engine.start_burn(1.0, 10_000);

    for _ in 0..20 {
        h.step();
    }

    assert!(h.engine.burn().active);
    assert_eq!(h.engine.burn().fuel_kg, 10.0);
}

#[test]
fn test_stop_burn_command() {
    let mut h = Harness::new();
    h.engine.start_burn(1.0, 10_000);
    h.step();
    h.engine.stop_burn();
    let fuel = h.engine.burn().fuel_kg;

    h.step();
    h.step();

    assert!(!h.engine.burn().active);
    assert_eq!(h.engine.burn().fuel_kg, fuel);
    assert!(h.events.entries().contains(&DspEvent::BurnStopped));
}

#[test]
fn test_status_published_only_on_change() {
    let mut h = Harness::new();
    for _ in 0..25 {
        h.step();
    }
    assert_eq!(h.status.entries(), vec![HealthStatus::Nominal]);

    // Amplitude without frequency: reported noisy, signal untouched.
    h.engine.set_noise(NoiseConfig { vib_amp: 0.1, ..NoiseConfig::default() });
    h.step();
    h.step();
    assert_eq!(h.status.entries(), vec![HealthStatus::Nominal, HealthStatus::Noisy]);
}

#[test]
fn test_stuck_at_overrides_auto_detection() {
    let mut h = Harness::new();
    h.engine.inject_fault(FaultType::StuckAt, 0, 0.0);
    // Guarantees a spike, hence a clipped sample, every tick.
    h.engine.set_noise(noisy(1_000.0, 0.0));

    for _ in 0..5 {
        h.step();
    }

    assert_eq!(h.engine.fault(), FaultType::StuckAt);
    assert_eq!(h.engine.status(), HealthStatus::Error);
    assert_eq!(h.status.entries(), vec![HealthStatus::Error]);
    assert_eq!(h.engine.telemetry().fault_code, FaultType::StuckAt.code());
}

#[test]
fn test_saturation_is_auto_detected() {
    let mut h = Harness::new();
    h.engine.set_noise(noisy(1_000.0, 0.0));
    h.step();

    let sample = h.engine.last_sample().copied().unwrap();
    assert_eq!(sample.raw, 3.0);
    assert!(sample.spiked);
    assert_eq!(h.engine.fault(), FaultType::SaturateHigh);
    assert_eq!(h.engine.spike_count(), 1);
    assert_eq!(h.status.entries(), vec![HealthStatus::Noisy, HealthStatus::Fault]);
}

#[test]
fn test_out_of_range_is_auto_detected() {
    let mut h = Harness::new();
    h.engine.set_scenario(Scenario::ImuStream);
    h.engine.set_measurement(2.75);
    h.step();

    assert_eq!(h.engine.fault(), FaultType::OutOfRange);
    assert_eq!(h.engine.status(), HealthStatus::Error);
}

#[test]
fn test_timed_fault_expires_and_reports() {
    let mut h = Harness::new();
    h.engine.inject_fault(FaultType::Dropout, 500, 0.0);
    assert_eq!(h.engine.fault_end_time_usec(), 500_000);

    h.clock.set_micros(499_000);
    h.engine.tick();
    assert_eq!(h.engine.fault(), FaultType::Dropout);

    h.clock.set_micros(500_000);
    h.engine.tick();
    assert_eq!(h.engine.fault(), FaultType::None);
    assert_eq!(h.engine.fault_end_time_usec(), 0);

    assert!(h.events.entries().contains(&DspEvent::FaultCleared(FaultType::Dropout)));
    assert_eq!(h.status.entries(), vec![HealthStatus::Fault, HealthStatus::Nominal]);
    assert_eq!(h.engine.fault_history().len(), 1);
    assert_eq!(h.engine.fault_history()[0].resolved_at_usec, Some(500_000));
}

#[test]
fn test_injecting_none_forces_status_resend() {
    let mut h = Harness::new();
    h.step();
    h.engine.inject_fault(FaultType::None, 0, 0.0);
    assert_eq!(h.status.entries(), vec![HealthStatus::Nominal, HealthStatus::Nominal]);
}

#[test]
fn test_measurement_passthrough_without_status() {
    let mut h = Harness::new();
    h.engine.set_scenario(Scenario::ImuStream);
    let before = h.status.len();

    h.engine.set_measurement(1.25);
    assert_eq!(h.status.len(), before);
    assert_eq!(h.engine.measurement(), 1.25);

    h.step();
    let sample = h.engine.last_sample().copied().unwrap();
    assert_eq!(sample.true_value, 1.25);
    assert_eq!(sample.raw, 1.25);
    assert_eq!(h.engine.telemetry().filtered_value, 1.25);
    assert_eq!(h.engine.telemetry().meas_value, 1.25);
}

#[test]
fn test_median_filter_through_engine() {
    let mut h = Harness::new();
    h.engine.set_scenario(Scenario::ImuStream);
    h.engine.set_filter(FilterSettings {
        kind: FilterKind::Median,
        median_window: 3,
        ..FilterSettings::default()
    });

    for value in [0.1, 0.2, 0.3, 0.4, 0.5] {
        h.engine.set_measurement(value);
        h.step();
    }

    assert_eq!(h.engine.telemetry().filtered_value, 0.4);
    assert_eq!(h.engine.telemetry().filter_type, FilterKind::Median.code());
}

#[test]
fn test_noise_is_deterministic_across_engines() {
    let mut a = Harness::new();
    let mut b = Harness::new();
    let noise = NoiseConfig { vib_amp: 0.2, vib_hz: 3.0, spike_rate: 2.0, rand_sigma: 0.3 };
    a.engine.set_noise(noise);
    b.engine.set_noise(noise);

    for _ in 0..200 {
        a.step();
        b.step();
        assert_eq!(a.engine.telemetry().raw_value, b.engine.telemetry().raw_value);
        assert_eq!(a.engine.telemetry().filtered_value, b.engine.telemetry().filtered_value);
    }

    assert_eq!(a.engine.rng_state(), b.engine.rng_state());
    assert_eq!(a.engine.spike_count(), b.engine.spike_count());
}

#[test]
fn test_jitter_then_spike_draw_order() {
    let mut h = Harness::new();
    h.engine.set_noise(noisy(50.0, 1.0));
    h.step();

    // Six jitter draws, then the spike draw on the seventh output.
    let sample = *h.engine.last_sample().unwrap();
    let jitter = Lcg::new(RNG_SEED).pseudo_gauss();
    assert!(sample.spiked);
    assert!((sample.noise - (jitter + SPIKE_MAGNITUDE)).abs() < 1e-5, "noise={}", sample.noise);
    assert_eq!(h.engine.rng_state(), 3_926_884_741);
    assert_eq!(h.engine.spike_count(), 1);

    // p = 0.2 stays below the seventh uniform: drawn but no spike.
    let mut calm = Harness::new();
    calm.engine.set_noise(noisy(10.0, 1.0));
    calm.step();
    let sample = *calm.engine.last_sample().unwrap();
    assert!(!sample.spiked);
    assert!((sample.noise - jitter).abs() < 1e-5);
    assert_eq!(calm.engine.rng_state(), 3_926_884_741);

    let mut jitter_only = Harness::new();
    jitter_only.engine.set_noise(noisy(0.0, 1.0));
    jitter_only.step();
    assert_eq!(jitter_only.engine.rng_state(), 3_802_821_438);
}

#[test]
fn test_overflowing_noise_parameter_does_not_poison_filter() {
    let mut h = Harness::new();
    let mut handler = ProtocolHandler::new();
    let command = handler
        .parse_command(
            r#"{"id":1,"command_type":{"SetNoise":{"vib_amp":0.1,"vib_hz":1e39,"spike_rate":0.0,"rand_sigma":0.0}}}"#,
        )
        .unwrap();
    assert_eq!(h.engine.execute(&command).status, ResponseStatus::Success);
    h.step();
    assert!(h.engine.telemetry().raw_value.is_finite());

    h.engine.set_noise(NoiseConfig::default());
    for _ in 0..50 {
        h.step();
    }
    assert!(h.engine.telemetry().filtered_value.is_finite());

    let json = handler
        .serialize_message(&ServerMessage::Telemetry(h.engine.telemetry().clone()))
        .unwrap()
        .to_string();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["data"]["filtered_value"].is_number());
}

#[test]
fn test_reset_restores_defaults_and_resends() {
    let mut h = Harness::new();
    h.engine.set_scenario(Scenario::ImuStream);
    h.engine.set_noise(noisy(0.0, 1.0));
    h.engine.set_filter(FilterSettings { kind: FilterKind::LowPass, ..FilterSettings::default() });
    h.engine.set_fuel(3.0);
    h.engine.set_measurement(0.5);
    h.step();
    h.step();
    h.status.clear();

    h.engine.reset_demo();

    assert_eq!(h.engine.scenario(), Scenario::ImuStream);
    assert_eq!(h.engine.noise(), &NoiseConfig::default());
    assert_eq!(h.engine.filter_settings(), &FilterSettings::default());
    assert_eq!(h.engine.fault(), FaultType::None);
    assert_eq!(h.engine.burn().fuel_kg, 10.0);
    assert_eq!(h.engine.measurement(), 0.0);
    assert_eq!(h.engine.spike_count(), 0);
    assert_eq!(h.engine.rng_state(), orbitdsp::signal::RNG_SEED);
    assert_eq!(h.status.entries(), vec![HealthStatus::Nominal]);
    assert_eq!(h.events.last(), Some(DspEvent::DemoReset));

    // Start marker is armed again.
    h.engine.set_scenario(Scenario::BurnMonitor);
    assert_eq!(h.status.last(), Some(HealthStatus::Start));
}

#[test]
fn test_start_marker_then_status_on_next_tick() {
    let mut h = Harness::new();
    h.engine.set_scenario(Scenario::BurnMonitor);
    assert_eq!(h.status.entries(), vec![HealthStatus::Start]);

    h.step();
    assert_eq!(h.status.entries(), vec![HealthStatus::Start, HealthStatus::Nominal]);
}

#[test]
fn test_status_not_latched_without_indicator() {
    let clock = ManualClock::new(0);
    let mut engine = DspEngine::new(DspPorts::new(clock.clone()).with_events(NullSink));
    engine.tick();
    assert_eq!(engine.last_sent_status(), None);

    let status: Recorder<HealthStatus> = Recorder::new();
    engine.connect_status(Some(Box::new(status.clone())));
    clock.advance_ms(TICK_MS);
    engine.tick();

    assert_eq!(status.entries(), vec![HealthStatus::Nominal]);
    assert_eq!(engine.last_sent_status(), Some(HealthStatus::Nominal));
}

#[test]
fn test_telemetry_refreshed_by_setters_and_ticks() {
    let mut h = Harness::new();
    assert_eq!(h.telemetry.len(), 1);

    h.engine.set_fuel(7.5);
    assert_eq!(h.telemetry.last().unwrap().fuel_kg, 7.5);

    h.clock.set_micros(1_000_000);
    h.engine.tick();
    let snapshot = h.telemetry.last().unwrap();
    assert_eq!(snapshot.timestamp_usec, 1_000_000);
    assert_eq!(snapshot.scenario(), Some(Scenario::BurnMonitor));
    assert_eq!(snapshot.raw_value, h.engine.last_sample().unwrap().raw);
}

#[test]
fn test_execute_command_sequence() {
    let mut h = Harness::new();
    let commands = [
        CommandType::SetScenario { scenario: Scenario::ImuStream },
        CommandType::SetFilter { filter_type: FilterKind::LowPass, ema_alpha: 0.1, median_win: 5, lpf_cutoff_hz: 2.0 },
        CommandType::SetNoise { vib_amp: 0.0, vib_hz: 0.0, spike_rate: 0.0, rand_sigma: 6.0 },
        CommandType::SetMeas { value: -0.4 },
        CommandType::InjectFault { fault_type: FaultType::SaturateLow, duration_ms: 1_000, level: 0.0 },
    ];

    for (i, command_type) in commands.into_iter().enumerate() {
        let response = h.engine.execute(&Command { id: i as u32 + 1, command_type });
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.id, i as u32 + 1);
    }

    assert_eq!(h.engine.scenario(), Scenario::ImuStream);
    assert_eq!(h.engine.filter_settings().kind, FilterKind::LowPass);
    assert_eq!(h.engine.filter_settings().lpf_cutoff_hz, 2.0);
    assert_eq!(h.engine.noise().rand_sigma, 6.0);
    assert_eq!(h.engine.measurement(), -0.4);
    assert_eq!(h.engine.fault(), FaultType::SaturateLow);
    assert_eq!(h.status.entries(), vec![HealthStatus::Nominal, HealthStatus::Noisy, HealthStatus::Fault]);
}
