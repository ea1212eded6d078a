use std::path::PathBuf;

use crate::server;
use clap::{Args, Parser, Subcommand};
use site_relay::config::AppConfig;
use site_relay::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Site Relay",
    about = "Serve the static website and relay its form submissions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the resolved configuration with secrets redacted
    Config,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the directory static assets are served from
    #[arg(long)]
    pub(crate) assets_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Config => {
            let config = AppConfig::load()?;
            println!("{config:#?}");
            Ok(())
        }
    }
}
