use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use frame_atlas_cli::{commands, Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Cluster(args) => commands::cluster(args)?,
        Commands::Locate(args) => commands::locate(args)?,
        Commands::Embed(args) => commands::embed(args)?,
        Commands::Scan(args) => commands::scan(args)?,
        Commands::Gen(args) => commands::gen(args)?,
        Commands::Version => {
            println!("frame-atlas {}", env!("CARGO_PKG_VERSION"));
            println!("frame-atlas-core {}", frame_atlas_core::VERSION);
            println!("frame-atlas-engine {}", frame_atlas_engine::VERSION);
        }
    }

    Ok(())
}
