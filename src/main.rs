use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cartoonizer::api::ApiServer;
use cartoonizer::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Cartoonizer")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Upload videos, cartoonize every frame and download the result")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Address to listen on")
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on")
                .value_parser(clap::value_parser!(u16))
        )
        .arg(
            Arg::new("data-root")
                .short('d')
                .long("data-root")
                .value_name("DIR")
                .help("Directory holding uploads, frames and styled outputs")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path))?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    if let Some(dir) = matches.get_one::<String>("data-root") {
        config.storage.data_root = PathBuf::from(dir);
    }
    if matches.get_flag("verbose") {
        config.logging.log_level = "debug".to_string();
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cartoonizer={},tower_http=info,warn", config.logging.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.performance.workers)
        .build_global()
        .map_err(|e| anyhow!("Failed to size worker pool: {}", e))?;

    info!("🚀 Cartoonizer starting...");
    info!("{}", config.summary());
    if config.pipeline.cleanup_on_failure {
        warn!("🧹 Partial artifacts will be removed when a full pipeline run fails");
    }

    ApiServer::new(config).start().await
}
