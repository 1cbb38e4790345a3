use mcl_client::{find_systems_with_config, DiscoveryConfig};
use tracing::info;

use crate::cmd::DiscoverArgs;
use crate::exit::{parse_duration, CliResult, SUCCESS};
use crate::output::{print_systems, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = DiscoveryConfig {
        window: parse_duration(&args.timeout)?,
        ..DiscoveryConfig::default()
    };
    if let Some(ports) = args.ports {
        config.ports = ports;
    }

    let systems = find_systems_with_config(&config);
    info!(found = systems.len(), "discovery complete");
    print_systems(&systems, format);
    Ok(SUCCESS)
}
