//! Core types for the desired network namespace state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Desired state for every managed namespace.
///
/// Deserialized from the merged YAML documents, or built in code with the
/// builder methods:
///
/// ```
/// use netnsplan::config::DesiredState;
///
/// let state = DesiredState::new().namespace("ns1", |ns| {
///     ns.ethernet("eth0", |d| {
///         d.address("192.168.0.1/24").route("default", "192.168.0.254")
///     })
///     .dummy("dummy0", |d| d.address("10.0.0.1/8"))
/// });
///
/// assert_eq!(state.netns["ns1"].ethernets["eth0"].addresses, ["192.168.0.1/24"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredState {
    /// Namespaces keyed by name.
    #[serde(default)]
    pub netns: BTreeMap<String, NamespaceConfig>,
}

impl DesiredState {
    /// Create an empty desired state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a namespace.
    pub fn namespace(
        mut self,
        name: &str,
        f: impl FnOnce(NamespaceConfig) -> NamespaceConfig,
    ) -> Self {
        self.netns
            .insert(name.to_string(), f(NamespaceConfig::default()));
        self
    }

    /// Whether no namespace is declared.
    pub fn is_empty(&self) -> bool {
        self.netns.is_empty()
    }
}

/// Desired state of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NamespaceConfig {
    /// Addresses and routes for `lo`. The loopback is always brought up.
    #[serde(default, skip_serializing_if = "DeviceConfig::is_empty")]
    pub loopback: DeviceConfig,
    /// Existing devices moved in from the default namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ethernets: BTreeMap<String, DeviceConfig>,
    /// Dummy devices created inside the namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dummy_devices: BTreeMap<String, DeviceConfig>,
    /// Veth pairs; the primary end lives in this namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub veth_devices: BTreeMap<String, VethConfig>,
    /// Shell script run inside the namespace after provisioning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_script: Option<String>,
}

impl NamespaceConfig {
    /// Configure the loopback device.
    pub fn loopback(mut self, f: impl FnOnce(DeviceConfig) -> DeviceConfig) -> Self {
        self.loopback = f(self.loopback);
        self
    }

    /// Add an ethernet device.
    pub fn ethernet(mut self, name: &str, f: impl FnOnce(DeviceConfig) -> DeviceConfig) -> Self {
        self.ethernets
            .insert(name.to_string(), f(DeviceConfig::default()));
        self
    }

    /// Add a dummy device.
    pub fn dummy(mut self, name: &str, f: impl FnOnce(DeviceConfig) -> DeviceConfig) -> Self {
        self.dummy_devices
            .insert(name.to_string(), f(DeviceConfig::default()));
        self
    }

    /// Add a veth device whose other end is called `peer`.
    pub fn veth(
        mut self,
        name: &str,
        peer: &str,
        f: impl FnOnce(VethConfig) -> VethConfig,
    ) -> Self {
        self.veth_devices
            .insert(name.to_string(), f(VethConfig::new(peer)));
        self
    }

    /// Set the post-provisioning script.
    pub fn post_script(mut self, script: impl Into<String>) -> Self {
        self.post_script = Some(script.into());
        self
    }

    /// The post-script, treating an empty script as absent.
    pub fn script(&self) -> Option<&str> {
        self.post_script.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Addresses and routes for one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// CIDR literals, applied in order.
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Routes through this device, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
}

impl DeviceConfig {
    /// Add an address in CIDR notation.
    pub fn address(mut self, cidr: &str) -> Self {
        self.addresses.push(cidr.to_string());
        self
    }

    /// Add a route.
    pub fn route(mut self, to: &str, via: &str) -> Self {
        self.routes.push(RouteConfig::new(to, via));
        self
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.routes.is_empty()
    }
}

/// A route declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Destination, `default` or a CIDR literal.
    pub to: String,
    /// Gateway address.
    pub via: String,
}

impl RouteConfig {
    /// Create a route declaration.
    pub fn new(to: &str, via: &str) -> Self {
        Self {
            to: to.to_string(),
            via: via.to_string(),
        }
    }
}

/// A veth pair declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VethConfig {
    /// Addresses of the primary end.
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Routes through the primary end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
    /// The other end of the pair.
    pub peer: PeerConfig,
}

impl VethConfig {
    /// Create a veth declaration with the given peer name.
    pub fn new(peer: &str) -> Self {
        Self {
            addresses: Vec::new(),
            routes: Vec::new(),
            peer: PeerConfig {
                name: peer.to_string(),
                ..Default::default()
            },
        }
    }

    /// Add an address to the primary end.
    pub fn address(mut self, cidr: &str) -> Self {
        self.addresses.push(cidr.to_string());
        self
    }

    /// Add a route through the primary end.
    pub fn route(mut self, to: &str, via: &str) -> Self {
        self.routes.push(RouteConfig::new(to, via));
        self
    }

    /// Place the peer end in a namespace instead of the default one.
    pub fn peer_netns(mut self, netns: &str) -> Self {
        self.peer.netns = Some(netns.to_string());
        self
    }

    /// Add an address to the peer end.
    pub fn peer_address(mut self, cidr: &str) -> Self {
        self.peer.addresses.push(cidr.to_string());
        self
    }

    /// Add a route through the peer end.
    pub fn peer_route(mut self, to: &str, via: &str) -> Self {
        self.peer.routes.push(RouteConfig::new(to, via));
        self
    }
}

/// The peer end of a veth pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerConfig {
    /// Peer interface name.
    pub name: String,
    /// Namespace for the peer; `None` leaves it in the default namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netns: Option<String>,
    /// Addresses of the peer end.
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Routes through the peer end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
}

impl PeerConfig {
    /// The peer namespace, treating an empty name as absent.
    pub fn namespace(&self) -> Option<&str> {
        self.netns.as_deref().filter(|n| !n.is_empty())
    }
}
