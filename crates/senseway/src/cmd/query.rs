use serde::Serialize;
use senseway_session::{Axes, FirmwareVersion, MacAddress, Metric, TelemetrySnapshot};

use crate::cmd::{Context, DeviceArgs, MetricArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, print_rows};

#[derive(Serialize)]
struct VersionOutput {
    id: u8,
    version: String,
    #[serde(flatten)]
    parts: FirmwareVersion,
}

pub fn version(args: DeviceArgs, ctx: &Context) -> CliResult<i32> {
    let session = ctx.open_session()?;
    let version = session
        .get_version(args.id)
        .map_err(|err| session_error("version query failed", err))?;

    let out = VersionOutput {
        id: args.id,
        version: version.to_string(),
        parts: version,
    };
    print_record(
        &out,
        &[("id", args.id.to_string()), ("version", out.version.clone())],
        ctx.format,
    );
    Ok(SUCCESS)
}

#[derive(Serialize)]
struct MacOutput {
    id: u8,
    mac: MacAddress,
}

pub fn mac(args: DeviceArgs, ctx: &Context) -> CliResult<i32> {
    let session = ctx.open_session()?;
    let mac = session
        .get_mac_address(args.id)
        .map_err(|err| session_error("MAC query failed", err))?;

    print_record(
        &MacOutput { id: args.id, mac },
        &[("id", args.id.to_string()), ("mac", mac.to_string())],
        ctx.format,
    );
    Ok(SUCCESS)
}

#[derive(Serialize)]
struct TelemetryOutput {
    id: u8,
    #[serde(flatten)]
    snapshot: TelemetrySnapshot,
}

pub fn telemetry(args: DeviceArgs, ctx: &Context) -> CliResult<i32> {
    let session = ctx.open_session()?;
    let snapshot = session
        .get_all_telemetry(args.id)
        .map_err(|err| session_error("telemetry query failed", err))?;

    let mut rows = vec![
        vec![
            "temperature".to_string(),
            format!("{:.2} °C", snapshot.temperature),
            String::new(),
            String::new(),
        ],
        vec![
            "sampling frequency".to_string(),
            format!("{} Hz", snapshot.sampling_frequency),
            String::new(),
            String::new(),
        ],
    ];
    rows.extend(
        Metric::ALL
            .into_iter()
            .map(|metric| axes_row(metric.name(), snapshot.metric(metric))),
    );

    let out = TelemetryOutput {
        id: args.id,
        snapshot,
    };
    print_rows(
        std::slice::from_ref(&out),
        &["METRIC", "X", "Y", "Z"],
        rows,
        ctx.format,
    );
    Ok(SUCCESS)
}

#[derive(Serialize)]
struct MetricOutput {
    id: u8,
    metric: Metric,
    #[serde(flatten)]
    value: Axes,
}

pub fn metric(args: MetricArgs, ctx: &Context) -> CliResult<i32> {
    let metric: Metric = args
        .name
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("{err}")))?;
    if metric.message_id().is_none() {
        return Err(CliError::new(
            USAGE,
            format!("{metric} is only reported by the telemetry command"),
        ));
    }

    let session = ctx.open_session()?;
    let value = session
        .get_metric(args.id, metric)
        .map_err(|err| session_error("metric query failed", err))?;

    print_rows(
        &[MetricOutput {
            id: args.id,
            metric,
            value,
        }],
        &["METRIC", "X", "Y", "Z"],
        vec![axes_row(metric.name(), value)],
        ctx.format,
    );
    Ok(SUCCESS)
}

fn axes_row(name: &str, axes: Axes) -> Vec<String> {
    vec![
        name.to_string(),
        format!("{:.4}", axes.x),
        format!("{:.4}", axes.y),
        format!("{:.4}", axes.z),
    ]
}
