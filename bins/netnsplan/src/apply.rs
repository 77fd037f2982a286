//! netnsplan apply - converge the system toward the configuration.

use clap::Args;
use netnsplan::iproute2::IpCommand;
use netnsplan::{ApplyOptions, DesiredState, Reconciler};

#[derive(Args)]
pub struct ApplyCmd {
    /// Run post-scripts even for namespaces that already exist.
    #[arg(short = 'R', long)]
    always_run_post_script: bool,
}

impl ApplyCmd {
    pub async fn run(&self, ip: &IpCommand, state: &DesiredState) -> anyhow::Result<()> {
        let options = ApplyOptions {
            always_run_post_script: self.always_run_post_script,
        };

        let result = Reconciler::with_options(ip, options).apply(state).await?;

        if result.is_empty() {
            tracing::info!("already up to date");
        } else {
            tracing::info!(changes = result.changes_made(), "applied");
        }
        Ok(())
    }
}
