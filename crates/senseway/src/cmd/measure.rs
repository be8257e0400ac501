use serde::Serialize;
use senseway_session::{AccelRange, BatchMeasurement, MeasurementRequest, SampleRate};
use tracing::info;

use crate::cmd::{Context, MeasureArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_record, print_rows};

#[derive(Serialize)]
struct MeasureOutput {
    id: u8,
    range: AccelRange,
    rate: SampleRate,
    sample_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<BatchMeasurement>,
}

pub fn run(args: MeasureArgs, ctx: &Context) -> CliResult<i32> {
    let range = AccelRange::try_from(args.range).map_err(|err| session_error("invalid range", err))?;
    let rate = SampleRate::try_from(args.freq).map_err(|err| session_error("invalid frequency", err))?;
    let request = MeasurementRequest {
        range,
        rate,
        sample_count: args.samples,
        notify_on_end: !args.no_notify,
    };
    request
        .validate()
        .map_err(|err| session_error("invalid sample count", err))?;

    let session = ctx.open_session()?;
    let mut conversation = session.conversation();
    if request.notify_on_end {
        info!(timeout = ?request.timeout(), "waiting for measurement to finish");
    }
    conversation
        .start_batch_measurement(args.id, &request)
        .map_err(|err| session_error("measurement failed", err))?;

    let samples = if args.no_read || args.no_notify {
        None
    } else {
        Some(
            conversation
                .read_measurement(args.id, args.samples, args.coefficient)
                .map_err(|err| session_error("sample download failed", err))?,
        )
    };
    drop(conversation);

    let out = MeasureOutput {
        id: args.id,
        range,
        rate,
        sample_count: args.samples,
        samples,
    };
    match &out.samples {
        Some(samples) => {
            let rows = (0..samples.len())
                .map(|i| {
                    vec![
                        i.to_string(),
                        format!("{:.4}", samples.x[i]),
                        format!("{:.4}", samples.y[i]),
                        format!("{:.4}", samples.z[i]),
                    ]
                })
                .collect();
            print_rows(std::slice::from_ref(&out), &["#", "X", "Y", "Z"], rows, ctx.format);
        }
        None => print_record(
            &out,
            &[
                ("id", args.id.to_string()),
                ("range", range.to_string()),
                ("rate", rate.to_string()),
                ("samples", args.samples.to_string()),
                (
                    "status",
                    if request.notify_on_end { "finished" } else { "started" }.to_string(),
                ),
            ],
            ctx.format,
        ),
    }
    Ok(SUCCESS)
}
