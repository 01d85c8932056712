use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("tslumd {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: tslumd");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol: TSL UMD v5");
    println!(
        "build_target: {}",
        option_env!("TSLUMD_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: session={}, async={}, cli=true",
        cfg!(feature = "session"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
