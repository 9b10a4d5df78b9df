use argh::FromArgs;
use std::path::PathBuf;

use meteobridge::config::Config;
use meteobridge::node;
use meteobridge::poller::Poller;
use meteobridge::profile::write_nodedefs;

/// MeteoBridge node: publishes weather-station telemetry over Zenoh.
#[derive(FromArgs)]
struct Args {
    /// path to the configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// zenoh endpoint to connect to
    #[argh(option, short = 'e')]
    endpoint: Option<String>,

    /// write ISY node definitions to this path and exit
    #[argh(option)]
    profile: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    node::setup_logging();

    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading config from: {}", path.display());
            Config::from_file(path)?
        }
        None => {
            log::info!("No config file given, using defaults");
            Config::default()
        }
    };
    log::info!(
        "Device: {}:{}, units: {:?}",
        config.device.host,
        config.device.port,
        config.units
    );

    if let Some(path) = &args.profile {
        let poller = Poller::new(config.poll_config()?);
        write_nodedefs(path, &poller.channel_maps())?;
        return Ok(());
    }

    node::run(config, args.endpoint.as_deref()).await
}
