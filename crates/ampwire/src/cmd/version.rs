use ampwire_session::DEFAULT_PORT;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ampwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ampwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("AMPWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("device_port: {DEFAULT_PORT}");
    println!(
        "features: session={}, cli=true",
        cfg!(feature = "session")
    );

    Ok(SUCCESS)
}
