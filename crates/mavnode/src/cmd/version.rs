use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("mavnode {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let registry = mavnode_schema::common::registry();
    println!("name: mavnode");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("MAVNODE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("protocols: MAVLink 1, MAVLink 2 (signing)");
    println!("builtin messages: {:?}", registry.ids());
    println!("features: async={}, serde={}, cli=true", cfg!(feature = "async"), cfg!(feature = "serde"));

    Ok(SUCCESS)
}
