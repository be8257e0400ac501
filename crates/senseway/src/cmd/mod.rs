use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use senseway_session::{CorrelationMode, Session, SessionConfig};
use senseway_transport::LinkConfig;
use tracing::debug;

use crate::exit::{session_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod addressing;
pub mod measure;
pub mod monitor;
pub mod ports;
pub mod query;
pub mod update;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show version information.
    Version(VersionArgs),
    /// List serial ports on this machine.
    Ports,
    /// Query a node's firmware version.
    DeviceVersion(DeviceArgs),
    /// Query a node's MAC address.
    Mac(DeviceArgs),
    /// Read every vibration metric of a node.
    Telemetry(DeviceArgs),
    /// Read one vibration metric of a node.
    Metric(MetricArgs),
    /// Run a batch measurement and download the samples.
    Measure(MeasureArgs),
    /// Flash new firmware onto a node.
    Update(UpdateArgs),
    /// Give a node a new bus id.
    Assign(AssignArgs),
    /// Ask a node to confirm its bus address is consistent.
    IntegrityCheck(DeviceArgs),
    /// List the nodes answering on the bus.
    Discover(DiscoverArgs),
    /// Print every frame received on the bus.
    Monitor(MonitorArgs),
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub port: PathBuf,
    pub baud_rate: u32,
    pub host_id: u8,
    pub timeout: Duration,
    pub fifo: bool,
    pub format: OutputFormat,
}

impl Context {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            baud_rate: self.baud_rate,
            ..LinkConfig::new(&self.port)
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host_id: self.host_id,
            command_timeout: self.timeout,
            correlation: if self.fifo {
                CorrelationMode::Fifo
            } else {
                CorrelationMode::Filtered
            },
            ..SessionConfig::default()
        }
    }

    /// Open the port and start a session. Call only after arguments are
    /// validated.
    pub fn open_session(&self) -> CliResult<Session> {
        debug!(port = %self.port.display(), baud_rate = self.baud_rate, "opening session");
        Session::open(&self.link_config(), self.session_config())
            .map_err(|err| session_error("open failed", err))
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Ports => ports::run(ctx),
        Command::DeviceVersion(args) => query::version(args, ctx),
        Command::Mac(args) => query::mac(args, ctx),
        Command::Telemetry(args) => query::telemetry(args, ctx),
        Command::Metric(args) => query::metric(args, ctx),
        Command::Measure(args) => measure::run(args, ctx),
        Command::Update(args) => update::run(args, ctx),
        Command::Assign(args) => addressing::assign(args, ctx),
        Command::IntegrityCheck(args) => addressing::integrity_check(args, ctx),
        Command::Discover(args) => addressing::discover(args, ctx),
        Command::Monitor(args) => monitor::run(args, ctx),
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Bus id of the node.
    pub id: u8,
}

#[derive(Args, Debug)]
pub struct MetricArgs {
    /// Bus id of the node.
    pub id: u8,
    /// Metric name: clearance, crest, grms, kurtosis, skewness, vrms, peak or sum.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct MeasureArgs {
    /// Bus id of the node.
    pub id: u8,
    /// Full-scale range in g (2, 4, 8, 16).
    #[arg(long)]
    pub range: u32,
    /// Sampling frequency in Hz (800, 1600, 3200, 6400, 12800).
    #[arg(long)]
    pub freq: u32,
    /// Number of samples per axis.
    #[arg(long)]
    pub samples: u32,
    /// Scale applied to raw samples.
    #[arg(long, default_value_t = 1.0)]
    pub coefficient: f64,
    /// Start the measurement and return without downloading samples.
    #[arg(long)]
    pub no_read: bool,
    /// Return as soon as the request is written instead of waiting for the
    /// node to finish. Implies --no-read.
    #[arg(long)]
    pub no_notify: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Bus id of the node.
    pub id: u8,
    /// MAC address of the node (e.g. 0A:B1:FF:00:02:9E).
    pub mac: String,
    /// Firmware image.
    pub file: PathBuf,
    /// Line rate while talking to the bootloader.
    #[arg(long, default_value_t = senseway_session::firmware::DEFAULT_UPDATE_BAUD_RATE)]
    pub update_baud: u32,
    /// Pause before querying the new version (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub settle: String,
}

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Current bus id of the node.
    pub id: u8,
    /// MAC address of the node.
    pub mac: String,
    /// Bus id to assign.
    pub new_id: u8,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Stop collecting answers after the bus stays quiet this long.
    #[arg(long, default_value = "500ms")]
    pub quiet: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Like [`parse_duration`] but rejects zero.
pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let duration = parse_duration(input)?;
    if duration.is_zero() {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }
    Ok(duration)
}
