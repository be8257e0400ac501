use senseway_session::{FirmwareImage, MacAddress, UpdateConfig, UpdateEvent, UpdateReport};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::{parse_duration, Context, UpdateArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::print_record;

#[derive(Serialize)]
struct UpdateOutput {
    id: u8,
    mac: MacAddress,
    #[serde(flatten)]
    report: UpdateReport,
}

pub fn run(args: UpdateArgs, ctx: &Context) -> CliResult<i32> {
    let mac: MacAddress = args
        .mac
        .parse()
        .map_err(|err| session_error("invalid MAC address", err))?;
    let settle_delay = parse_duration(&args.settle)?;
    let image = FirmwareImage::from_path(&args.file)
        .map_err(|err| session_error(&format!("cannot load {}", args.file.display()), err))?;
    let config = UpdateConfig {
        update_baud_rate: args.update_baud,
        settle_delay,
        ..UpdateConfig::default()
    };

    info!(
        device = args.id,
        %mac,
        bytes = image.total_size(),
        chunks = image.chunk_count(),
        "starting firmware update"
    );

    let session = ctx.open_session()?;
    let mut observer = log_progress;
    let report = session
        .update_firmware(args.id, &mac, &image, &config, &mut observer)
        .map_err(|err| session_error("update failed", err))?;

    let version = report
        .version
        .map_or_else(|| "unknown".to_string(), |v| v.to_string());
    let fields = [
        ("id", args.id.to_string()),
        ("mac", mac.to_string()),
        ("image size", report.image_size.to_string()),
        ("chunks", report.chunk_count.to_string()),
        ("retries", report.retries.to_string()),
        ("version", version),
    ];
    print_record(
        &UpdateOutput {
            id: args.id,
            mac,
            report,
        },
        &fields,
        ctx.format,
    );
    Ok(SUCCESS)
}

fn log_progress(event: UpdateEvent) {
    match event {
        UpdateEvent::PhaseEntered(phase) => info!(%phase, "update phase"),
        UpdateEvent::ChunkAttemptFailed {
            chunk,
            attempt,
            max_attempts,
            reason,
        } => warn!(chunk, attempt, max_attempts, %reason, "chunk attempt failed"),
        UpdateEvent::ChunkAcknowledged {
            chunk,
            total,
            attempts,
        } => info!(chunk, total, attempts, "chunk acknowledged"),
        UpdateEvent::Finished { success } => info!(success, "update finished"),
        UpdateEvent::VersionQueried(Some(version)) => info!(%version, "node reports new version"),
        UpdateEvent::VersionQueried(None) => warn!("node did not report its version after update"),
    }
}
