//! Validation of the desired state.
//!
//! Validation runs before any command is issued so that a broken document
//! never leaves a half-provisioned system behind. Errors reject the
//! configuration; warnings are logged by the caller and do not.
//!
//! ```
//! use netnsplan::config::DesiredState;
//!
//! let state = DesiredState::new().namespace("ns1", |ns| {
//!     ns.ethernet("eth0", |d| d).dummy("eth0", |d| d)
//! });
//!
//! let result = state.validate();
//! assert!(!result.is_valid());
//! for err in &result.errors {
//!     eprintln!("{}", err);
//! }
//! ```

use std::collections::{BTreeSet, HashMap};

use super::types::{DesiredState, NamespaceConfig, RouteConfig};
use crate::error::{Error, ValidationErrorInfo};

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Result of validating a desired state.
///
/// Errors reject the tree. Warnings are for the caller to log.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationErrorInfo>,
    pub warnings: Vec<ValidationErrorInfo>,
}

impl ValidationResult {
    /// True when there are no errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationErrorInfo::new(field, message));
    }

    /// Add a warning to the result.
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationErrorInfo::new(field, message));
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// `Err(Error::Validation)` carrying every error, if there are any.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }
}

/// Validate an interface name.
pub fn validate_ifname(name: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    if name.is_empty() {
        result.add_error(field, "interface name cannot be empty");
        return result;
    }

    if name.len() >= IFNAMSIZ {
        result.add_error(
            field,
            format!(
                "interface name too long ({} > {} chars)",
                name.len(),
                IFNAMSIZ - 1
            ),
        );
    }

    if name.contains('/') || name.contains('\0') || name.chars().any(char::is_whitespace) {
        result.add_error(field, "interface name contains invalid characters");
    }

    if name.starts_with('.') || name.starts_with('-') {
        result.add_warning(
            field,
            "interface name starting with '.' or '-' may cause issues",
        );
    }

    result
}

/// Validate a namespace name.
pub fn validate_netns_name(name: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    if name.is_empty() {
        result.add_error(field, "namespace name cannot be empty");
    } else if name == "." || name == ".." {
        result.add_error(field, format!("'{}' is not a valid namespace name", name));
    } else if name.contains('/') || name.contains('\0') || name.chars().any(char::is_whitespace) {
        result.add_error(field, "namespace name contains invalid characters");
    }

    result
}

/// Validate a CIDR address literal.
///
/// Only the shape is checked; the string is passed to the kernel verbatim
/// and compared verbatim against observed addresses.
pub fn validate_cidr(address: &str, field: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    match address.split_once('/') {
        Some((addr, prefix)) if !addr.is_empty() && !prefix.is_empty() => {
            if prefix.parse::<u8>().map_or(true, |p| p > 128) {
                result.add_error(field, format!("invalid prefix length in '{}'", address));
            }
        }
        _ => result.add_error(
            field,
            format!("address '{}' must be in CIDR notation (addr/prefix)", address),
        ),
    }

    result
}

fn validate_route(route: &RouteConfig, field: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    if route.to.is_empty() {
        result.add_error(format!("{}.to", field), "route destination cannot be empty");
    }
    if route.via.is_empty() {
        result.add_error(format!("{}.via", field), "route gateway cannot be empty");
    }

    result
}

fn validate_device(addresses: &[String], routes: &[RouteConfig], field: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (i, address) in addresses.iter().enumerate() {
        result.merge(validate_cidr(address, &format!("{}.addresses[{}]", field, i)));
    }
    for (i, route) in routes.iter().enumerate() {
        result.merge(validate_route(route, &format!("{}.routes[{}]", field, i)));
    }

    result
}

impl DesiredState {
    /// Validate the whole tree.
    ///
    /// Link names are namespace-scoped, so every name is claimed in the scope
    /// it ends up in: devices in their namespace, veth peers in their peer
    /// namespace (or the default namespace). Two claims in one scope are an
    /// error.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        // (scope, link name) -> field that claimed it
        let mut claims: HashMap<(Option<&str>, &str), String> = HashMap::new();
        let declared: BTreeSet<&str> = self.netns.keys().map(String::as_str).collect();

        for (netns, ns) in &self.netns {
            let ns_field = format!("netns.{}", netns);
            result.merge(validate_netns_name(netns, &ns_field));
            result.merge(validate_device(
                &ns.loopback.addresses,
                &ns.loopback.routes,
                &format!("{}.loopback", ns_field),
            ));

            for (name, field) in device_names(ns, &ns_field) {
                result.merge(validate_ifname(name, &field));
                if name == "lo" {
                    result.add_error(&field, "'lo' is managed through the loopback section");
                    continue;
                }
                record_claim(&mut claims, &mut result, Some(netns.as_str()), name, field);
            }

            for (name, dev) in &ns.ethernets {
                let field = format!("{}.ethernets.{}", ns_field, name);
                result.merge(validate_device(&dev.addresses, &dev.routes, &field));
            }
            for (name, dev) in &ns.dummy_devices {
                let field = format!("{}.dummy-devices.{}", ns_field, name);
                result.merge(validate_device(&dev.addresses, &dev.routes, &field));
            }

            for (name, veth) in &ns.veth_devices {
                let field = format!("{}.veth-devices.{}", ns_field, name);
                result.merge(validate_device(&veth.addresses, &veth.routes, &field));

                let peer_field = format!("{}.peer", field);
                result.merge(validate_ifname(
                    &veth.peer.name,
                    &format!("{}.name", peer_field),
                ));
                result.merge(validate_device(
                    &veth.peer.addresses,
                    &veth.peer.routes,
                    &peer_field,
                ));

                if veth.peer.name == *name {
                    result.add_error(
                        format!("{}.name", peer_field),
                        "peer name must differ from the device name",
                    );
                    continue;
                }

                if let Some(peer_ns) = &veth.peer.netns {
                    if peer_ns.is_empty() {
                        result.add_error(
                            format!("{}.netns", peer_field),
                            "peer namespace cannot be empty; omit it to keep the peer in the default namespace",
                        );
                        continue;
                    }
                    if !declared.contains(peer_ns.as_str()) {
                        result.add_warning(
                            format!("{}.netns", peer_field),
                            format!("namespace '{}' is not declared and must already exist", peer_ns),
                        );
                    }
                }

                if !veth.peer.name.is_empty() {
                    record_claim(
                        &mut claims,
                        &mut result,
                        veth.peer.namespace(),
                        &veth.peer.name,
                        format!("{}.name", peer_field),
                    );
                }
            }
        }

        result
    }
}

/// Names of every device declared in a namespace, with their field paths.
fn device_names<'a>(ns: &'a NamespaceConfig, ns_field: &str) -> Vec<(&'a str, String)> {
    let ethernets = ns
        .ethernets
        .keys()
        .map(|n| (n.as_str(), format!("{}.ethernets.{}", ns_field, n)));
    let dummies = ns
        .dummy_devices
        .keys()
        .map(|n| (n.as_str(), format!("{}.dummy-devices.{}", ns_field, n)));
    let veths = ns
        .veth_devices
        .keys()
        .map(|n| (n.as_str(), format!("{}.veth-devices.{}", ns_field, n)));
    ethernets.chain(dummies).chain(veths).collect()
}

fn record_claim<'a>(
    claims: &mut HashMap<(Option<&'a str>, &'a str), String>,
    result: &mut ValidationResult,
    scope: Option<&'a str>,
    name: &'a str,
    field: String,
) {
    if let Some(previous) = claims.get(&(scope, name)) {
        let place = match scope {
            Some(netns) => format!("netns {}", netns),
            None => "the default netns".to_string(),
        };
        result.add_error(
            field,
            format!("link name '{}' in {} is already used by {}", name, place, previous),
        );
    } else {
        claims.insert((scope, name), field);
    }
}
