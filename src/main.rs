//! apphost: register, run and back up user-submitted app snippets
//!
//! Every invocation loads the registry, performs one command and writes the
//! registry back. See `apphost --help` for the command list.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info};

use apphost::cli::{execute_command, Commands};
use apphost::{AppHost, HostConfig};

#[derive(Parser)]
#[command(name = "apphost")]
#[command(about = "Host for user-submitted app snippets")]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "apphost.toml")]
    config: PathBuf,

    /// Root directory for the registry, code and backups (overrides config file)
    #[arg(long, env = "APPHOST_ROOT")]
    root: Option<PathBuf>,

    /// Interpreter used to run apps (overrides config file)
    #[arg(long, env = "APPHOST_INTERPRETER")]
    interpreter: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "apphost=debug" } else { "apphost=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = if cli.config.exists() {
        HostConfig::load(&cli.config)?
    } else {
        debug!(path = %cli.config.display(), "Config file not found, using defaults");
        HostConfig::default()
    };

    // Apply CLI overrides
    if let Some(root) = cli.root {
        config.paths.root = root;
    }
    if let Some(interpreter) = cli.interpreter {
        config.loader.interpreter = interpreter;
    }

    info!(root = %config.paths.root.display(), "Using host root");

    let mut host = AppHost::open(&config);
    match execute_command(&mut host, cli.command) {
        Ok(output) => {
            println!("{}", output.trim_end());
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
