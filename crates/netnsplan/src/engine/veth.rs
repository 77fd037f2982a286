//! Veth pair placement.
//!
//! A veth pair is always created in the default namespace and then each end
//! is moved where it belongs. Because a previous run may have stopped at any
//! point, each end can be found in one of three places: where it belongs, in
//! the default namespace, or nowhere. [`VethPlacement`] captures that
//! observation before anything is changed.

use super::device::link_exists;
use super::{ApplyResult, Change, Reconciler};
use crate::command::{CommandExecutor, StateInspector};
use crate::config::VethConfig;
use crate::error::Result;
use crate::scope::NamespaceScope;

/// Where the two ends of a veth pair were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPlacement {
    /// The primary end is already in its namespace.
    pub primary_in_target: bool,
    /// The primary end is in the default namespace. Only probed when it is
    /// not in its namespace.
    pub primary_in_default: bool,
    /// Where the peer end belongs.
    pub peer_scope: NamespaceScope,
    /// The peer end is already in `peer_scope`.
    pub peer_in_place: bool,
}

impl VethPlacement {
    /// Nothing found anywhere: the pair has to be created.
    pub fn needs_create(&self) -> bool {
        !self.primary_in_target && !self.primary_in_default
    }

    /// The primary end must be moved into its namespace.
    pub fn needs_primary_move(&self) -> bool {
        !self.primary_in_target
    }

    /// The peer end must be moved out of the default namespace.
    pub fn needs_peer_move(&self) -> bool {
        !self.peer_scope.is_default() && !self.peer_in_place
    }

    /// Observe where the ends of veth `name` in `netns` currently are.
    pub async fn inspect<S: StateInspector>(
        inspector: &S,
        netns: &str,
        name: &str,
        veth: &VethConfig,
    ) -> Result<Self> {
        let target = NamespaceScope::named(netns);
        let peer_scope = NamespaceScope::from_optional(veth.peer.namespace());

        let primary_in_target = link_exists(inspector, &target, name).await?;
        let primary_in_default = if primary_in_target {
            false
        } else {
            link_exists(inspector, &NamespaceScope::Default, name).await?
        };
        let peer_in_place = link_exists(inspector, &peer_scope, &veth.peer.name).await?;

        Ok(Self {
            primary_in_target,
            primary_in_default,
            peer_scope,
            peer_in_place,
        })
    }
}

impl<C: CommandExecutor> Reconciler<'_, C> {
    /// Create, place and configure both ends of one veth pair.
    pub(crate) async fn setup_veth_device(
        &self,
        netns: &str,
        name: &str,
        veth: &VethConfig,
        result: &mut ApplyResult,
    ) -> Result<()> {
        let target = NamespaceScope::named(netns);
        let peer = &veth.peer;
        let placement = VethPlacement::inspect(self.commands, netns, name, veth).await?;
        tracing::debug!(name = %name, peer = %peer.name, placement = ?placement, "veth placement");

        if placement.needs_create() {
            self.perform(
                Change::CreateVethPair {
                    scope: NamespaceScope::Default,
                    name: name.to_string(),
                    peer: peer.name.clone(),
                },
                result,
            )
            .await?;
        }

        if placement.needs_primary_move() {
            self.perform(
                Change::MoveLink {
                    scope: NamespaceScope::Default,
                    name: name.to_string(),
                    target: netns.to_string(),
                },
                result,
            )
            .await?;
        } else {
            tracing::debug!(name = %name, netns = %netns, "device is already exists in netns");
        }

        self.reconcile_device(&target, name, &veth.addresses, &veth.routes, result)
            .await?;

        if placement.needs_peer_move()
            && let Some(peer_netns) = placement.peer_scope.name()
        {
            self.perform(
                Change::MoveLink {
                    scope: NamespaceScope::Default,
                    name: peer.name.clone(),
                    target: peer_netns.to_string(),
                },
                result,
            )
            .await?;
        }

        self.reconcile_device(
            &placement.peer_scope,
            &peer.name,
            &peer.addresses,
            &peer.routes,
            result,
        )
        .await
    }
}
