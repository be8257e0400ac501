mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "senseway", version, about = "SenseWay wired sensor bus tool")]
struct Cli {
    /// Serial device the bus is attached to.
    #[arg(long, env = "SENSEWAY_PORT", default_value = "/dev/ttyUSB0", global = true)]
    port: PathBuf,

    /// Bus line rate.
    #[arg(long, env = "SENSEWAY_BAUD", default_value_t = senseway_transport::DEFAULT_BAUD_RATE, global = true)]
    baud: u32,

    /// Bus address of this host.
    #[arg(long, env = "SENSEWAY_HOST_ID", default_value_t = senseway_frame::DEFAULT_HOST_ID, global = true)]
    host_id: u8,

    /// Response timeout for node commands (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s", global = true)]
    timeout: String,

    /// Take the next received frame as the response instead of matching it.
    #[arg(long, global = true)]
    fifo: bool,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::parse_timeout(&cli.timeout).and_then(|timeout| {
        let ctx = Context {
            port: cli.port,
            baud_rate: cli.baud,
            host_id: cli.host_id,
            timeout,
            fifo: cli.fifo,
            format,
        };
        cmd::run(cli.command, &ctx)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_update_subcommand() {
        let cli = Cli::try_parse_from([
            "senseway",
            "--port",
            "/dev/ttyACM0",
            "update",
            "4",
            "0A:B1:FF:00:02:9E",
            "firmware.bin",
            "--settle",
            "2s",
        ])
        .expect("update args should parse");

        assert_eq!(cli.port, PathBuf::from("/dev/ttyACM0"));
        assert!(matches!(cli.command, Command::Update(_)));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["senseway", "mac", "4", "--fifo", "--host-id", "20"])
            .expect("global flags should parse after the subcommand");
        assert!(cli.fifo);
        assert_eq!(cli.host_id, 20);
    }

    #[test]
    fn measure_requires_samples() {
        let err = Cli::try_parse_from(["senseway", "measure", "4", "--range", "4", "--freq", "800"])
            .expect_err("missing --samples should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn measure_accepts_no_notify() {
        let cli = Cli::try_parse_from([
            "senseway", "measure", "4", "--range", "4", "--freq", "800", "--samples", "10",
            "--no-notify",
        ])
        .expect("--no-notify should parse");
        match cli.command {
            Command::Measure(args) => {
                assert!(args.no_notify);
                assert!(!args.no_read);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn device_id_must_fit_a_byte() {
        let err = Cli::try_parse_from(["senseway", "device-version", "300"])
            .expect_err("out of range id should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
