//! netnsplan destroy - delete the configured namespaces.

use clap::Args;
use netnsplan::iproute2::IpCommand;
use netnsplan::{DesiredState, Reconciler};

#[derive(Args)]
pub struct DestroyCmd {}

impl DestroyCmd {
    pub async fn run(&self, ip: &IpCommand, state: &DesiredState) -> anyhow::Result<()> {
        let validation = state.validate();
        for warning in &validation.warnings {
            tracing::warn!(field = %warning.field, "{}", warning.message);
        }
        validation.into_result()?;

        let result = Reconciler::new(ip).destroy(state).await?;
        tracing::info!(deleted = result.changes_made(), "destroyed");
        Ok(())
    }
}
