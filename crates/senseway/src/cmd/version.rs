use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("senseway {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: senseway");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", env!("SENSEWAY_BUILD_TARGET"));
    println!("profile: {}", env!("SENSEWAY_BUILD_PROFILE"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "default_baud_rate: {}",
        senseway_transport::DEFAULT_BAUD_RATE
    );
    println!(
        "update_baud_rate: {}",
        senseway_session::firmware::DEFAULT_UPDATE_BAUD_RATE
    );
    println!(
        "max_payload: {}",
        senseway_frame::DEFAULT_MAX_PAYLOAD
    );

    Ok(SUCCESS)
}
