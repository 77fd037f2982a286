//! Reconciliation engine.
//!
//! The engine converges live kernel state toward a [`DesiredState`]. It only
//! ever adds: namespaces, links, addresses and routes that exist but are not
//! declared are left alone.
//!
//! Nothing is remembered between runs. Every decision is taken from a fresh
//! query, so re-running an apply after a failure resumes where it stopped and
//! an apply against an already converged system issues no mutations at all.
//!
//! # Ordering
//!
//! A veth peer may be placed in a namespace declared elsewhere in the tree.
//! Provisioning namespaces one at a time (create, then wire devices) would
//! fail whenever the peer namespace happens to come later. The engine
//! therefore runs in two phases:
//!
//! 1. Ensure every declared namespace exists.
//! 2. For every namespace: loopback, ethernets, dummy devices, veth devices,
//!    then the post-script.
//!
//! ```ignore
//! use netnsplan::config;
//! use netnsplan::engine::{ApplyOptions, Reconciler};
//! use netnsplan::iproute2::IpCommand;
//!
//! let state = config::load_dir("/etc/netnsplan")?;
//! let ip = IpCommand::default();
//!
//! let result = Reconciler::new(&ip).apply(&state).await?;
//! println!("{}", result.summary_text());
//! ```

mod destroy;
mod device;
mod namespace;
mod veth;

pub use veth::VethPlacement;

use std::collections::HashSet;
use std::fmt;

use crate::command::CommandExecutor;
use crate::config::DesiredState;
use crate::error::Result;
use crate::scope::NamespaceScope;

/// Options for applying configuration.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Run post-scripts even for namespaces that already existed.
    ///
    /// By default a post-script only runs when its namespace was created by
    /// the current apply.
    pub always_run_post_script: bool,
}

/// A single mutation issued by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// `ip netns add`.
    CreateNamespace { name: String },
    /// `ip netns del`.
    DeleteNamespace { name: String },
    /// `ip link set dev <name> up`.
    SetLinkUp { scope: NamespaceScope, name: String },
    /// `ip address add`.
    AddAddress {
        scope: NamespaceScope,
        name: String,
        address: String,
    },
    /// `ip route add <to> via <via> dev <name>`.
    AddRoute {
        scope: NamespaceScope,
        name: String,
        to: String,
        via: String,
    },
    /// `ip link add <name> type dummy`.
    CreateDummyLink { scope: NamespaceScope, name: String },
    /// `ip link add <name> type veth peer name <peer>`.
    CreateVethPair {
        scope: NamespaceScope,
        name: String,
        peer: String,
    },
    /// `ip link set dev <name> netns <target>`.
    MoveLink {
        scope: NamespaceScope,
        name: String,
        target: String,
    },
    /// Post-script executed by `/bin/sh` inside a namespace.
    RunPostScript { netns: String, script: String },
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateNamespace { name } => write!(f, "create netns {}", name),
            Self::DeleteNamespace { name } => write!(f, "delete netns {}", name),
            Self::SetLinkUp { scope, name } => write!(f, "link up {} in {}", name, scope),
            Self::AddAddress {
                scope,
                name,
                address,
            } => write!(f, "add address {} to {} in {}", address, name, scope),
            Self::AddRoute {
                scope,
                name,
                to,
                via,
            } => write!(f, "add route {} via {} dev {} in {}", to, via, name, scope),
            Self::CreateDummyLink { scope, name } => {
                write!(f, "add dummy device {} in {}", name, scope)
            }
            Self::CreateVethPair { scope, name, peer } => {
                write!(f, "add veth device {} peer {} in {}", name, peer, scope)
            }
            Self::MoveLink {
                scope,
                name,
                target,
            } => write!(f, "set netns {} from {} to {}", name, scope, target),
            Self::RunPostScript { netns, .. } => write!(f, "run post-script in netns {}", netns),
        }
    }
}

/// Result of an apply or destroy.
#[derive(Debug, Clone, Default)]
pub struct ApplyResult {
    /// Mutations performed, in order.
    pub changes: Vec<Change>,
}

impl ApplyResult {
    /// Number of changes made.
    pub fn changes_made(&self) -> usize {
        self.changes.len()
    }

    /// Whether the system was already converged.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Get a human-readable summary.
    pub fn summary_text(&self) -> String {
        if self.changes.is_empty() {
            "No changes made".to_string()
        } else {
            self.changes
                .iter()
                .map(Change::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Drives a [`CommandExecutor`] toward a [`DesiredState`].
///
/// The engine is strictly sequential: one command at a time, each awaited
/// before the next decision is taken.
#[derive(Debug)]
pub struct Reconciler<'a, C> {
    commands: &'a C,
    options: ApplyOptions,
}

impl<'a, C: CommandExecutor> Reconciler<'a, C> {
    /// Create a reconciler with default options.
    pub fn new(commands: &'a C) -> Self {
        Self::with_options(commands, ApplyOptions::default())
    }

    /// Create a reconciler with custom options.
    pub fn with_options(commands: &'a C, options: ApplyOptions) -> Self {
        Self { commands, options }
    }

    /// Apply the desired state.
    ///
    /// The state is validated first; an invalid tree fails before any
    /// command is issued. After that the first error aborts the whole apply.
    /// Changes made up to that point stay applied.
    pub async fn apply(&self, state: &DesiredState) -> Result<ApplyResult> {
        let validation = state.validate();
        for warning in &validation.warnings {
            tracing::warn!(field = %warning.field, "{}", warning.message);
        }
        validation.into_result()?;

        let mut result = ApplyResult::default();

        let created = self.ensure_namespaces(state, &mut result).await?;

        for (name, ns) in &state.netns {
            self.provision_namespace(name, ns, created.contains(name.as_str()), &mut result)
                .await?;
        }

        Ok(result)
    }

    /// Phase 1: make sure every declared namespace exists.
    ///
    /// Returns the namespaces created by this call.
    async fn ensure_namespaces<'s>(
        &self,
        state: &'s DesiredState,
        result: &mut ApplyResult,
    ) -> Result<HashSet<&'s str>> {
        let mut created = HashSet::new();

        for name in state.netns.keys() {
            let exists = self
                .commands
                .namespace_exists(name)
                .await
                .map_err(|e| e.with_context(format!("check netns {}", name)))?;

            if exists {
                tracing::warn!(name = %name, "netns is already exists");
                continue;
            }

            self.perform(
                Change::CreateNamespace {
                    name: name.clone(),
                },
                result,
            )
            .await?;
            created.insert(name.as_str());
        }

        Ok(created)
    }

    /// Issue one mutation and record it.
    ///
    /// Failures carry the change description as context.
    async fn perform(&self, change: Change, result: &mut ApplyResult) -> Result<()> {
        let c = self.commands;
        let outcome = match &change {
            Change::CreateNamespace { name } => {
                tracing::info!(name = %name, "create netns");
                c.create_namespace(name).await
            }
            Change::DeleteNamespace { name } => {
                tracing::info!(name = %name, "delete netns");
                c.delete_namespace(name).await
            }
            Change::SetLinkUp { scope, name } => {
                tracing::info!(name = %name, scope = %scope, "link up");
                c.set_link_up(scope, name).await
            }
            Change::AddAddress {
                scope,
                name,
                address,
            } => {
                tracing::info!(name = %name, address = %address, scope = %scope, "add address");
                c.add_address(scope, name, address).await
            }
            Change::AddRoute {
                scope,
                name,
                to,
                via,
            } => {
                tracing::info!(name = %name, to = %to, via = %via, scope = %scope, "add route");
                c.add_route(scope, name, to, via).await
            }
            Change::CreateDummyLink { scope, name } => {
                tracing::info!(name = %name, scope = %scope, "add dummy device");
                c.create_dummy_link(scope, name).await
            }
            Change::CreateVethPair { scope, name, peer } => {
                tracing::info!(name = %name, peer = %peer, scope = %scope, "add veth device");
                c.create_veth_pair(scope, name, peer).await
            }
            Change::MoveLink {
                scope,
                name,
                target,
            } => {
                tracing::info!(name = %name, netns = %target, "set netns");
                c.move_link_to_namespace(scope, name, target).await
            }
            Change::RunPostScript { netns, script } => {
                tracing::info!(netns = %netns, "run post-script");
                c.run_in_namespace(netns, script).await.map(|output| {
                    tracing::debug!(netns = %netns, output = %output, "post-script output");
                })
            }
        };

        outcome.map_err(|e| e.with_context(change.to_string()))?;
        result.changes.push(change);
        Ok(())
    }
}
