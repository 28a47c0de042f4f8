use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for the Fetcharr server binary.
#[derive(Parser, Debug)]
#[command(name = "fetcharr-server")]
#[command(about = "Durable media acquisition pipeline")]
pub struct Args {
    /// Path to a TOML configuration file.
    #[arg(long, env = "FETCHARR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `server.port`.
    #[arg(short, long, env = "FETCHARR_SERVER__PORT")]
    pub port: Option<u16>,

    /// Overrides `database.url`.
    #[arg(long, env = "FETCHARR_DATABASE__URL")]
    pub database_url: Option<String>,

    /// Overrides `log_level`.
    #[arg(long, env = "FETCHARR_LOG_LEVEL")]
    pub log_level: Option<String>,
}
