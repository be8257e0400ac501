use senseway_session::MacAddress;
use serde::Serialize;

use crate::cmd::{parse_duration, AssignArgs, Context, DeviceArgs, DiscoverArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_record, print_rows};

#[derive(Serialize)]
struct AssignOutput {
    mac: MacAddress,
    previous_id: u8,
    id: u8,
}

pub fn assign(args: AssignArgs, ctx: &Context) -> CliResult<i32> {
    let mac: MacAddress = args
        .mac
        .parse()
        .map_err(|err| session_error("invalid MAC address", err))?;

    let session = ctx.open_session()?;
    session
        .set_device_id(args.id, &mac, args.new_id)
        .map_err(|err| session_error("id assignment failed", err))?;

    print_record(
        &AssignOutput {
            mac,
            previous_id: args.id,
            id: args.new_id,
        },
        &[
            ("mac", mac.to_string()),
            ("previous id", args.id.to_string()),
            ("id", args.new_id.to_string()),
        ],
        ctx.format,
    );
    Ok(SUCCESS)
}

#[derive(Serialize)]
struct CheckOutput {
    id: u8,
    ok: bool,
}

pub fn integrity_check(args: DeviceArgs, ctx: &Context) -> CliResult<i32> {
    let session = ctx.open_session()?;
    session
        .integrity_check(args.id)
        .map_err(|err| session_error("integrity check failed", err))?;

    print_record(
        &CheckOutput { id: args.id, ok: true },
        &[("id", args.id.to_string()), ("integrity", "ok".to_string())],
        ctx.format,
    );
    Ok(SUCCESS)
}

pub fn discover(args: DiscoverArgs, ctx: &Context) -> CliResult<i32> {
    let quiet = parse_duration(&args.quiet)?;

    let session = ctx.open_session()?;
    let nodes = session
        .discover(quiet)
        .map_err(|err| session_error("discovery failed", err))?;

    let rows = nodes
        .iter()
        .map(|node| vec![node.id.to_string(), node.mac.to_string()])
        .collect();
    print_rows(&nodes, &["ID", "MAC"], rows, ctx.format);
    Ok(SUCCESS)
}
