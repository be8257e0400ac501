use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cmd::{Context, MonitorArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::print_frame;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, ctx: &Context) -> CliResult<i32> {
    let session = ctx.open_session()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let inbound = match session.recv(POLL_INTERVAL) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => continue,
            Err(err) => return Err(session_error("receive failed", err)),
        };

        print_frame(&inbound, ctx.format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    let stats = session.stats();
    info!(
        frames = stats.frames_received,
        decode_errors = stats.decode_errors,
        "monitor stopped"
    );
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
