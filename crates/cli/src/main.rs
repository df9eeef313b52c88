mod config;
mod provider;
mod serve;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::serve::ServeArgs;

#[derive(Parser)]
#[command(name = "appfuse")]
#[command(about = "Serve a directory of numbered files over a FUSE device")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve requests until the kernel releases the filesystem
    Serve(ServeArgs),

    /// Show version information
    Version,
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let settings = args.settings()?;
            init_tracing(settings.log_filter.as_deref());
            serve::run(settings)?;
        }

        Commands::Version => {
            println!("appfuse {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
