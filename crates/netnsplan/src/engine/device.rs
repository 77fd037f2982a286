//! Per-device convergence: link state, addresses, routes.

use super::{ApplyResult, Change, Reconciler};
use crate::command::{CommandExecutor, StateInspector};
use crate::config::RouteConfig;
use crate::error::Result;
use crate::scope::NamespaceScope;

/// Whether `name` exists in `scope`.
///
/// A missing device is an answer here, not an error. Anything else the
/// query reports (permissions, a broken transport) aborts the apply.
pub(crate) async fn link_exists<S: StateInspector>(
    inspector: &S,
    scope: &NamespaceScope,
    name: &str,
) -> Result<bool> {
    match inspector.show_link(scope, name).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.with_context(format!("show link {} in {}", name, scope))),
    }
}

impl<C: CommandExecutor> Reconciler<'_, C> {
    /// Bring `name` up and add the declared addresses and routes it lacks.
    ///
    /// The device must already exist in `scope`. Addresses and routes that
    /// are present but not declared are kept.
    pub(crate) async fn reconcile_device(
        &self,
        scope: &NamespaceScope,
        name: &str,
        addresses: &[String],
        routes: &[RouteConfig],
        result: &mut ApplyResult,
    ) -> Result<()> {
        let link = self
            .commands
            .show_link(scope, name)
            .await
            .map_err(|e| e.with_context(format!("show link {} in {}", name, scope)))?;

        if link.is_up() {
            tracing::debug!(name = %name, scope = %scope, "link is already up");
        } else {
            self.perform(
                Change::SetLinkUp {
                    scope: scope.clone(),
                    name: name.to_string(),
                },
                result,
            )
            .await?;
        }

        if !addresses.is_empty() {
            let current = self
                .commands
                .show_addresses(scope, name)
                .await
                .map_err(|e| e.with_context(format!("show addresses of {} in {}", name, scope)))?;

            for address in addresses {
                if current.iter().any(|a| a == address) {
                    tracing::debug!(name = %name, address = %address, "address is already exists");
                    continue;
                }
                self.perform(
                    Change::AddAddress {
                        scope: scope.clone(),
                        name: name.to_string(),
                        address: address.clone(),
                    },
                    result,
                )
                .await?;
            }
        }

        if !routes.is_empty() {
            let current = self
                .commands
                .show_routes(scope, name)
                .await
                .map_err(|e| e.with_context(format!("show routes of {} in {}", name, scope)))?;

            for route in routes {
                if current.iter().any(|r| r.matches(&route.to, &route.via)) {
                    tracing::debug!(name = %name, to = %route.to, via = %route.via, "route is already exists");
                    continue;
                }
                self.perform(
                    Change::AddRoute {
                        scope: scope.clone(),
                        name: name.to_string(),
                        to: route.to.clone(),
                        via: route.via.clone(),
                    },
                    result,
                )
                .await?;
            }
        }

        Ok(())
    }
}
