use serde::Serialize;

use crate::cmd::Context;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::print_rows;

#[derive(Serialize)]
struct PortOutput {
    name: String,
    selected: bool,
}

pub fn run(ctx: &Context) -> CliResult<i32> {
    let ports = senseway_transport::available_ports()
        .map_err(|err| transport_error("port enumeration failed", err))?;

    let selected = ctx.port.to_string_lossy();
    let out: Vec<PortOutput> = ports
        .into_iter()
        .map(|name| PortOutput {
            selected: name == selected,
            name,
        })
        .collect();

    let rows = out
        .iter()
        .map(|port| {
            vec![
                port.name.clone(),
                if port.selected { "*" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_rows(&out, &["PORT", "SELECTED"], rows, ctx.format);
    Ok(SUCCESS)
}
