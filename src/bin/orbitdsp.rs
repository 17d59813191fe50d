use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use orbitdsp::fault::FaultType;
use orbitdsp::filter::FilterKind;
use orbitdsp::protocol::{Command, CommandResponse, CommandType, ResponseStatus, ServerMessage};
use orbitdsp::signal::Scenario;
use orbitdsp::telemetry::TelemetrySnapshot;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

fn parses_as<T: std::str::FromStr>(what: &'static str) -> impl Fn(String) -> Result<(), String> {
    move |v| v.parse::<T>().map(|_| ()).map_err(|_| format!("{} must be a number", what))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("orbitdsp")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🛰️  OrbitDSP - command the sensor/actuator simulator")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .subcommand(SubCommand::with_name("ping").about("🏓 Test connection to the simulator"))
        .subcommand(
            SubCommand::with_name("scenario")
                .about("🎬 Select the signal scenario")
                .arg(
                    Arg::with_name("scenario")
                        .required(true)
                        .possible_values(&["burn", "imu"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("filter")
                .about("🎛️  Configure the filter bank")
                .arg(
                    Arg::with_name("type")
                        .required(true)
                        .possible_values(&["ema", "median", "lpf"]),
                )
                .arg(
                    Arg::with_name("alpha")
                        .long("alpha")
                        .takes_value(true)
                        .default_value("0.1")
                        .validator(parses_as::<f32>("alpha")),
                )
                .arg(
                    Arg::with_name("window")
                        .long("window")
                        .takes_value(true)
                        .default_value("5")
                        .validator(parses_as::<u32>("window")),
                )
                .arg(
                    Arg::with_name("cutoff")
                        .long("cutoff")
                        .value_name("HZ")
                        .takes_value(true)
                        .default_value("1.0")
                        .validator(parses_as::<f32>("cutoff")),
                ),
        )
        .subcommand(
            SubCommand::with_name("noise")
                .about("📳 Configure noise injection")
                .arg(Arg::with_name("vib-amp").long("vib-amp").takes_value(true).default_value("0").validator(parses_as::<f32>("vib-amp")))
                .arg(Arg::with_name("vib-hz").long("vib-hz").takes_value(true).default_value("0").validator(parses_as::<f32>("vib-hz")))
                .arg(Arg::with_name("spike-rate").long("spike-rate").takes_value(true).default_value("0").validator(parses_as::<f32>("spike-rate")))
                .arg(Arg::with_name("sigma").long("sigma").takes_value(true).default_value("0").validator(parses_as::<f32>("sigma"))),
        )
        .subcommand(
            SubCommand::with_name("fault")
                .about("⚠️  Inject a sensor fault (none clears)")
                .arg(
                    Arg::with_name("type")
                        .required(true)
                        .possible_values(&["none", "saturate-high", "saturate-low", "stuck-at", "out-of-range", "dropout"]),
                )
                .arg(
                    Arg::with_name("duration")
                        .short("d")
                        .long("duration")
                        .value_name("MS")
                        .help("Fault duration in milliseconds (0 holds until changed)")
                        .takes_value(true)
                        .default_value("0")
                        .validator(parses_as::<u32>("duration")),
                ),
        )
        .subcommand(
            SubCommand::with_name("fuel")
                .about("⛽ Set the fuel mass")
                .arg(Arg::with_name("kg").required(true).validator(parses_as::<f32>("fuel"))),
        )
        .subcommand(
            SubCommand::with_name("burn")
                .about("🔥 Thruster burn control")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("start")
                        .about("Start a burn")
                        .arg(Arg::with_name("rate").required(true).help("Burn rate in kg/s").validator(parses_as::<f32>("rate")))
                        .arg(Arg::with_name("duration").required(true).help("Duration in milliseconds").validator(parses_as::<u32>("duration"))),
                )
                .subcommand(SubCommand::with_name("stop").about("Stop the burn")),
        )
        .subcommand(
            SubCommand::with_name("meas")
                .about("📐 Feed an external measurement (IMU stream)")
                .arg(Arg::with_name("value").required(true).allow_hyphen_values(true).validator(parses_as::<f32>("value"))),
        )
        .subcommand(SubCommand::with_name("reset").about("♻️  Restore demo defaults"))
        .subcommand(
            SubCommand::with_name("monitor")
                .about("📈 Monitor live telemetry stream")
                .arg(
                    Arg::with_name("count")
                        .short("n")
                        .long("count")
                        .value_name("N")
                        .help("Stop after N snapshots (default: infinite)")
                        .takes_value(true)
                        .validator(parses_as::<u64>("count")),
                ),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT).parse::<u16>()?;
    let format = matches.value_of("format").unwrap_or("table");

    let (action, command_type) = match matches.subcommand() {
        ("monitor", Some(sub)) => {
            let limit = sub.value_of("count").map(str::parse::<u64>).transpose()?;
            return monitor(host, port, format, limit).await;
        }
        (name, sub) => match build_command(name, sub)? {
            Some(built) => built,
            None => {
                println!("{}", "No command specified. Use --help for usage information.".yellow());
                return Ok(());
            }
        },
    };

    let command = Command { id: command_id(), command_type };
    let response = send_command(host, port, &command).await?;
    print_command_result(&action, &response, format)?;

    Ok(())
}

fn build_command(name: &str, sub: Option<&ArgMatches<'_>>) -> Result<Option<(String, CommandType)>, Box<dyn std::error::Error>> {
    let arg = |key: &str| sub.and_then(|m| m.value_of(key)).unwrap_or_default().to_string();

    let built = match name {
        "ping" => ("Ping".to_string(), CommandType::Ping),
        "scenario" => {
            let scenario = if arg("scenario") == "imu" { Scenario::ImuStream } else { Scenario::BurnMonitor };
            (format!("Scenario {}", scenario), CommandType::SetScenario { scenario })
        }
        "filter" => {
            let filter_type = match arg("type").as_str() {
                "median" => FilterKind::Median,
                "lpf" => FilterKind::LowPass,
                _ => FilterKind::Ema,
            };
            (
                format!("Filter {}", filter_type),
                CommandType::SetFilter {
                    filter_type,
                    ema_alpha: arg("alpha").parse()?,
                    median_win: arg("window").parse()?,
                    lpf_cutoff_hz: arg("cutoff").parse()?,
                },
            )
        }
        "noise" => (
            "Noise".to_string(),
            CommandType::SetNoise {
                vib_amp: arg("vib-amp").parse()?,
                vib_hz: arg("vib-hz").parse()?,
                spike_rate: arg("spike-rate").parse()?,
                rand_sigma: arg("sigma").parse()?,
            },
        ),
        "fault" => {
            let fault_type = parse_fault(&arg("type"));
            (
                format!("Fault {}", fault_type),
                CommandType::InjectFault {
                    fault_type,
                    duration_ms: arg("duration").parse()?,
                    level: 0.0,
                },
            )
        }
        "fuel" => {
            let fuel_kg: f32 = arg("kg").parse()?;
            (format!("Fuel {:.2} kg", fuel_kg), CommandType::SetFuel { fuel_kg })
        }
        "burn" => match sub.map(|m| m.subcommand()) {
            Some(("start", Some(start))) => {
                let burn_rate_kg_s: f32 = start.value_of("rate").unwrap_or_default().parse()?;
                let duration_ms: u32 = start.value_of("duration").unwrap_or_default().parse()?;
                (
                    format!("Burn {:.2} kg/s for {} ms", burn_rate_kg_s, duration_ms),
                    CommandType::StartBurn { burn_rate_kg_s, duration_ms },
                )
            }
            Some(("stop", _)) => ("Burn stop".to_string(), CommandType::StopBurn),
            _ => return Ok(None),
        },
        "meas" => {
            let value: f32 = arg("value").parse()?;
            (format!("Measurement {:.3}", value), CommandType::SetMeas { value })
        }
        "reset" => ("Demo reset".to_string(), CommandType::ResetDemo),
        _ => return Ok(None),
    };

    Ok(Some(built))
}

fn parse_fault(name: &str) -> FaultType {
    match name {
        "saturate-high" => FaultType::SaturateHigh,
        "saturate-low" => FaultType::SaturateLow,
        "stuck-at" => FaultType::StuckAt,
        "out-of-range" => FaultType::OutOfRange,
        "dropout" => FaultType::Dropout,
        _ => FaultType::None,
    }
}

fn command_id() -> u32 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(1);
    (millis as u32).max(1)
}

async fn connect(host: &str, port: u16) -> Result<TcpStream, Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", host, port);
    match TcpStream::connect(&addr).await {
        Ok(stream) => Ok(stream),
        Err(e) => {
            eprintln!("{} Failed to connect to OrbitDSP simulator at {}", "❌".red(), addr.bright_white());
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Server is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "cargo run --bin orbitdsp-simulator".bright_cyan());
            } else {
                eprintln!("{} Network error: {}", "🔌".yellow(), e.to_string().bright_red());
            }
            Err(e.into())
        }
    }
}

/// Send one command and wait for the response carrying its id. Telemetry
/// lines interleaved on the same connection are skipped.
async fn send_command(host: &str, port: u16, command: &Command) -> Result<CommandResponse, Box<dyn std::error::Error>> {
    let stream = connect(host, port).await?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let encoded = serde_json::to_string(command)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    let wait = async {
        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str::<ServerMessage>(&line) {
                Ok(ServerMessage::Response(response)) if response.id == command.id || response.id == 0 => {
                    return Ok(response);
                }
                _ => continue,
            }
        }
        Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "Server closed connection"))
    };

    match tokio::time::timeout(RESPONSE_TIMEOUT, wait).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            eprintln!("{} Command timed out after {} seconds", "⏰".yellow(), RESPONSE_TIMEOUT.as_secs());
            Err("Command timeout".into())
        }
    }
}

fn print_command_result(action: &str, response: &CommandResponse, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => println!("{}", serde_json::to_string(response)?),
        "compact" => match response.status {
            ResponseStatus::Success => println!("{}", "OK".bright_green()),
            _ => println!("{}", "FAIL".bright_red()),
        },
        _ => {
            let message = response.message.as_deref().unwrap_or("Command rejected");
            match response.status {
                ResponseStatus::Success => {
                    println!("{} {}", "✅".green(), action.bright_white());
                }
                ResponseStatus::NegativeAck => {
                    println!("{} {} rejected: {}", "❌".red(), action.bright_white(), message.bright_red());
                }
                ResponseStatus::InvalidCommand | ResponseStatus::ParseError => {
                    println!("{} {} not understood: {}", "❓".blue(), action.bright_white(), message.bright_red());
                }
            }
        }
    }
    Ok(())
}

async fn monitor(host: &str, port: u16, format: &str, limit: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let stream = connect(host, port).await?;
    let mut lines = BufReader::new(stream).lines();

    if format == "table" {
        println!("{}", "📡 Monitoring OrbitDSP telemetry (Press Ctrl+C to stop)...".bright_blue().bold());
        println!(
            "{}",
            "│ Time (s)   │ Scen │ Filt │ Fault          │    Raw │ Filtered │ Spikes │  Fuel kg │ Burn │".bright_white()
        );
    }

    let mut shown = 0u64;
    while let Some(line) = lines.next_line().await? {
        let snapshot = match serde_json::from_str::<ServerMessage>(&line) {
            Ok(ServerMessage::Telemetry(snapshot)) => snapshot,
            _ => continue,
        };

        match format {
            "json" => println!("{}", line),
            "compact" => print_compact(&snapshot),
            _ => print_table_row(&snapshot),
        }

        shown += 1;
        if limit.map_or(false, |n| shown >= n) {
            break;
        }
    }

    Ok(())
}

fn print_table_row(t: &TelemetrySnapshot) {
    let scenario = match t.scenario() {
        Some(Scenario::BurnMonitor) => "BURN",
        Some(Scenario::ImuStream) => " IMU",
        None => "   ?",
    };
    let filter = t.filter_kind().map_or_else(|| "?".to_string(), |k| k.to_string());
    let fault = match t.fault() {
        Some(FaultType::None) => format!("{:<14}", "NONE").green(),
        Some(kind) => format!("{:<14}", kind.to_string()).bright_red(),
        None => format!("{:<14}", "?").yellow(),
    };
    let fuel = if t.fuel_kg > 1.0 {
        format!("{:>8.3}", t.fuel_kg).green()
    } else {
        format!("{:>8.3}", t.fuel_kg).yellow()
    };
    let burn = if t.burn_active { "  ON".bright_yellow() } else { " OFF".dimmed() };

    println!(
        "│ {:>10.2} │ {} │ {:>4} │ {} │ {:>6.3} │ {:>8.3} │ {:>6} │ {} │ {} │",
        t.timestamp_usec as f64 / 1e6,
        scenario,
        filter,
        fault,
        t.raw_value,
        t.filtered_value,
        t.spike_count,
        fuel,
        burn
    );
}

fn print_compact(t: &TelemetrySnapshot) {
    let fault = t.fault().unwrap_or_default();
    let status = if fault.is_active() { "FAULT".red() } else { "OK".green() };
    println!(
        "[{}] {} | raw {:.3} | filt {:.3} | fuel {:.2} kg{}",
        t.timestamp_usec / 1_000_000,
        status,
        t.raw_value,
        t.filtered_value,
        t.fuel_kg,
        if t.burn_active { " | BURN" } else { "" }
    );
}
