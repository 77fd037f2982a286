//! Network command capability.
//!
//! The engine never talks to the kernel directly. It reads state through
//! [`StateInspector`] and mutates it through [`CommandExecutor`], both
//! parameterized by an explicit [`NamespaceScope`] on every call.
//!
//! Two implementations ship with the crate:
//!
//! - [`IpCommand`](crate::iproute2::IpCommand) runs the `ip` binary.
//! - [`FakeNetwork`](crate::lab::FakeNetwork) keeps an in-memory kernel
//!   (behind the `lab` feature).
//!
//! Every method fails with [`Error::NotFound`](crate::Error::NotFound) when the
//! named namespace or link does not exist, so callers can branch with
//! [`Error::is_not_found`](crate::Error::is_not_found) instead of inspecting
//! messages.

use crate::error::Result;
use crate::scope::NamespaceScope;

/// A link as observed in one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Interface name.
    pub name: String,
    /// Interface flags as reported by the kernel (`UP`, `LOWER_UP`, ...).
    pub flags: Vec<String>,
}

impl Link {
    /// Create a link with the given flags.
    pub fn new(name: impl Into<String>, flags: &[&str]) -> Self {
        Self {
            name: name.into(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Whether the administrative `UP` flag is set.
    pub fn is_up(&self) -> bool {
        self.flags.iter().any(|f| f == "UP")
    }
}

/// A route as observed on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRoute {
    /// Destination (`default` or a CIDR literal).
    pub to: String,
    /// Gateway, if the route has one.
    pub via: Option<String>,
}

impl ObservedRoute {
    /// Exact (to, via) comparison; no address normalization.
    pub fn matches(&self, to: &str, via: &str) -> bool {
        self.to == to && self.via.as_deref() == Some(via)
    }
}

/// Read-only view of kernel network state.
///
/// Every call is a point-in-time snapshot. Nothing is cached: state may change
/// between a query and a later mutation, and such races surface as ordinary
/// command errors.
#[allow(async_fn_in_trait)]
pub trait StateInspector {
    /// Check whether a named namespace exists.
    async fn namespace_exists(&self, name: &str) -> Result<bool>;

    /// Show one link.
    async fn show_link(&self, scope: &NamespaceScope, name: &str) -> Result<Link>;

    /// Addresses on a device as CIDR literals (`192.168.0.1/24`).
    async fn show_addresses(&self, scope: &NamespaceScope, name: &str) -> Result<Vec<String>>;

    /// Routes through a device.
    async fn show_routes(&self, scope: &NamespaceScope, name: &str) -> Result<Vec<ObservedRoute>>;
}

/// Mutations of kernel network state.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: StateInspector {
    /// Create a named namespace.
    async fn create_namespace(&self, name: &str) -> Result<()>;

    /// Delete a named namespace.
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    /// Set a link administratively up.
    async fn set_link_up(&self, scope: &NamespaceScope, name: &str) -> Result<()>;

    /// Add a CIDR address to a device.
    async fn add_address(&self, scope: &NamespaceScope, name: &str, address: &str) -> Result<()>;

    /// Add a route `to` via gateway `via` through a device.
    async fn add_route(&self, scope: &NamespaceScope, name: &str, to: &str, via: &str)
    -> Result<()>;

    /// Create a dummy link directly in `scope`.
    async fn create_dummy_link(&self, scope: &NamespaceScope, name: &str) -> Result<()>;

    /// Create a veth pair in `scope`.
    async fn create_veth_pair(&self, scope: &NamespaceScope, name: &str, peer: &str)
    -> Result<()>;

    /// Move a link from `scope` into the named namespace `target`.
    async fn move_link_to_namespace(
        &self,
        scope: &NamespaceScope,
        name: &str,
        target: &str,
    ) -> Result<()>;

    /// Run a shell script inside a namespace and return its standard output.
    async fn run_in_namespace(&self, namespace: &str, script: &str) -> Result<String>;
}
