//! netnsplan - declarative network namespace provisioning.

mod apply;
mod destroy;
mod show;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use netnsplan::DesiredState;
use netnsplan::config::{self, DEFAULT_CONFIG_DIR};
use netnsplan::iproute2::{DEFAULT_IP_PATH, IpCommand};

#[derive(Parser)]
#[command(
    name = "netnsplan",
    version,
    about = "Easily automate Linux netns networks and configurations via YAML"
)]
struct Cli {
    /// Directory holding the *.yaml configuration files.
    #[arg(short = 'd', long, global = true, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Path of the ip command.
    #[arg(long, global = true, default_value = DEFAULT_IP_PATH)]
    cmd: PathBuf,

    /// Enable debug logging.
    #[arg(long, global = true, conflicts_with = "quiet")]
    debug: bool,

    /// Only log errors.
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the configuration to the system.
    Apply(apply::ApplyCmd),

    /// Delete every configured network namespace.
    Destroy(destroy::DestroyCmd),

    /// Print the merged configuration.
    Show(show::ShowCmd),
}

impl Cli {
    fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }

    fn load_config(&self) -> anyhow::Result<DesiredState> {
        let state = config::load_dir(&self.config_dir)?;
        tracing::debug!(dir = %self.config_dir.display(), netns = state.netns.len(), "config loaded");
        Ok(state)
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let ip = IpCommand::new(&cli.cmd);

    match &cli.command {
        Command::Apply(cmd) => cmd.run(&ip, &cli.load_config()?).await,
        Command::Destroy(cmd) => cmd.run(&ip, &cli.load_config()?).await,
        Command::Show(cmd) => cmd.run(&cli.load_config()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level().into()),
        )
        .init();

    // Execute command
    let result = run(&cli).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
