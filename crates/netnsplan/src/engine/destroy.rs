//! Teardown of declared namespaces.

use super::{ApplyResult, Change, Reconciler};
use crate::command::CommandExecutor;
use crate::config::DesiredState;
use crate::error::Result;

impl<C: CommandExecutor> Reconciler<'_, C> {
    /// Delete every declared namespace that exists.
    ///
    /// Missing namespaces are skipped with a warning. A namespace that still
    /// has processes running inside it stops the teardown with
    /// [`Error::NamespaceBusy`](crate::Error::NamespaceBusy).
    pub async fn destroy(&self, state: &DesiredState) -> Result<ApplyResult> {
        let mut result = ApplyResult::default();

        for name in state.netns.keys() {
            let exists = self
                .commands
                .namespace_exists(name)
                .await
                .map_err(|e| e.with_context(format!("check netns {}", name)))?;

            if !exists {
                tracing::warn!(name = %name, "netns is not exists");
                continue;
            }

            self.perform(
                Change::DeleteNamespace {
                    name: name.clone(),
                },
                &mut result,
            )
            .await?;
        }

        Ok(result)
    }
}
