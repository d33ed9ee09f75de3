// Confluence entrypoint.

use anyhow::Context;
use tracing::{error, info};

use confluence::app::{self, parse_cli_args};
use confluence::config::{load_exchange_descriptors, Config, ConfigLoader};
use confluence::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_cli_args();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config_file {
        loader = loader.with_file(path);
    }

    let mut config = Config::load(&loader).context("loading configuration")?;

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(path) = &args.exchanges_file {
        config.poller.exchanges_file = path.clone();
    }

    init_logging(&config.logging).context("initializing logging")?;

    if args.print_config {
        println!("{config:#?}");
        return Ok(());
    }

    if args.validate_only {
        let descriptors = load_exchange_descriptors(&config.poller.exchanges_file)
            .context("validating exchange descriptors")?;
        info!(
            exchanges = descriptors.len(),
            environment = loader.environment(),
            "configuration valid"
        );
        return Ok(());
    }

    if args.discover {
        return app::discover(config).await.context("symbol discovery");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = loader.environment(),
        mode = ?config.server.service_mode,
        "starting confluence"
    );

    if let Err(e) = app::run(config).await {
        error!(error = %e, "fatal error");
        return Err(e.into());
    }
    Ok(())
}
