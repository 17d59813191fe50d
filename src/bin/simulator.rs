use clap::{App, Arg};
use orbitdsp::config::SimulatorConfig;
use orbitdsp::ports::{DspPorts, StatusSink, SystemClock, TelemetrySink, TracingEventSink};
use orbitdsp::protocol::{create_response, ProtocolError, ProtocolHandler, ResponseStatus, ServerMessage};
use orbitdsp::scheduler::tick_period;
use orbitdsp::status::HealthStatus;
use orbitdsp::telemetry::{TelemetrySnapshot, TickDownlink};
use orbitdsp::DspEngine;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

const TELEMETRY_BROADCAST_BUFFER_SIZE: usize = 256;

/// Stand-in for the Morse blinker: logs each status letter it receives.
struct IndicatorLog {
    enabled: bool,
}

impl StatusSink for IndicatorLog {
    fn send_status(&mut self, status: HealthStatus) {
        if self.enabled {
            info!(target: "orbitdsp::indicator", "💡 {} {}", status.letter(), status.morse());
        }
    }
}

struct BroadcastTelemetry {
    tx: broadcast::Sender<String>,
}

impl TelemetrySink for BroadcastTelemetry {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) {
        if self.tx.receiver_count() == 0 {
            return;
        }
        match serde_json::to_string(&ServerMessage::Telemetry(snapshot.clone())) {
            Ok(line) => {
                let _ = self.tx.send(line);
            }
            Err(e) => warn!("Failed to encode telemetry: {}", e),
        }
    }
}

fn load_config() -> Result<SimulatorConfig, Box<dyn std::error::Error>> {
    let matches = App::new("orbitdsp-simulator")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🛰️  OrbitDSP sensor/actuator simulator daemon")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Address to bind")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("TCP port to listen on")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("tick-hz")
                .long("tick-hz")
                .value_name("HZ")
                .help("Simulation tick rate")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("telemetry-every")
                .long("telemetry-every")
                .value_name("N")
                .help("Send telemetry to clients every N ticks")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("quiet-indicator")
                .long("quiet-indicator")
                .help("Do not log status indicator changes"),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };

    if let Some(host) = matches.value_of("host") {
        config.host = host.to_string();
    }
    if let Some(port) = matches.value_of("port") {
        config.port = port.parse()?;
    }
    if let Some(hz) = matches.value_of("tick-hz") {
        config.tick_hz = hz.parse()?;
    }
    if let Some(every) = matches.value_of("telemetry-every") {
        config.telemetry_decimation = every.parse()?;
    }
    if matches.is_present("quiet-indicator") {
        config.status_log = false;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = load_config()?;

    println!("🛰️  OrbitDSP Simulator");
    println!("======================");

    let (telemetry_tx, _) = broadcast::channel(TELEMETRY_BROADCAST_BUFFER_SIZE);

    let ports = DspPorts::new(SystemClock)
        .with_status(IndicatorLog { enabled: config.status_log })
        .with_events(TracingEventSink);
    let mut downlink = TickDownlink::new(
        BroadcastTelemetry { tx: telemetry_tx.clone() },
        config.telemetry_decimation,
    );
    let engine = Arc::new(Mutex::new(DspEngine::new(ports)));

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("🌐 TCP server listening on {}", config.bind_address());

    let tcp_engine = Arc::clone(&engine);
    let tcp_telemetry_tx = telemetry_tx.clone();
    let tcp_server = tokio::spawn(async move {
        serve(listener, tcp_engine, tcp_telemetry_tx).await;
    });

    let mut interval = time::interval(tick_period(config.tick_hz));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("⏱️  Ticking at {} Hz", config.tick_hz);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let mut engine = engine.lock().await;
                engine.tick();
                downlink.on_tick(engine.telemetry());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    tcp_server.abort();
    println!("🛑 OrbitDSP Simulator stopped");

    Ok(())
}

async fn serve(listener: TcpListener, engine: Arc<Mutex<DspEngine>>, telemetry_tx: broadcast::Sender<String>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 New client connected: {}", addr);
                let client_engine = Arc::clone(&engine);
                let client_telemetry_rx = telemetry_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_engine, client_telemetry_rx).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    engine: Arc<Mutex<DspEngine>>,
    mut telemetry_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let writer = Arc::new(Mutex::new(writer));

    let telemetry_writer = Arc::clone(&writer);
    let telemetry_task = tokio::spawn(async move {
        loop {
            match telemetry_rx.recv().await {
                Ok(line) => {
                    let mut guard = telemetry_writer.lock().await;
                    if guard.write_all(line.as_bytes()).await.is_err() || guard.write_all(b"\n").await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Telemetry stream lagged, {} snapshots dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut handler = ProtocolHandler::new();
    let mut line = String::new();
    loop {
        line.clear();
        if buf_reader.read_line(&mut line).await? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match handler.parse_command(&line) {
            Ok(command) => {
                info!("📨 Received command: {:?}", command);
                engine.lock().await.execute(&command)
            }
            Err(e) => {
                warn!("Rejected command line: {}", e);
                let status = match e {
                    ProtocolError::MessageTooLarge => ResponseStatus::InvalidCommand,
                    _ => ResponseStatus::ParseError,
                };
                let now = engine.lock().await.telemetry().timestamp_usec;
                create_response(0, now, status, Some(&e.to_string()))
            }
        };

        let encoded = handler.serialize_message(&ServerMessage::Response(response))?.to_string();
        let mut guard = writer.lock().await;
        guard.write_all(encoded.as_bytes()).await?;
        guard.write_all(b"\n").await?;
    }

    telemetry_task.abort();
    Ok(())
}
