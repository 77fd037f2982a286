//! Parsing of `ip` output.
//!
//! `ip -json` prints one JSON array per invocation. Field sets vary between
//! iproute2 releases and link types, so only the fields the engine reads are
//! declared here and the rest are skipped.

use serde::Deserialize;

use crate::command::{Link, ObservedRoute};
use crate::error::{Error, Result};

/// One element of `ip -json link show`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkInfo {
    pub ifname: String,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// One element of `ip -json address show`.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceInfo {
    #[serde(default)]
    pub addr_info: Vec<AddressInfo>,
}

/// An address entry inside [`InterfaceInfo`].
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInfo {
    pub local: String,
    pub prefixlen: u8,
}

impl AddressInfo {
    /// CIDR literal as iproute2 prints it.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.local, self.prefixlen)
    }
}

/// One element of `ip -json route show`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteInfo {
    pub dst: String,
    #[serde(default)]
    pub gateway: Option<String>,
}

impl From<RouteInfo> for ObservedRoute {
    fn from(route: RouteInfo) -> Self {
        Self {
            to: route.dst,
            via: route.gateway,
        }
    }
}

/// Some iproute2 releases print nothing instead of `[]`.
fn parse_array<T: for<'de> Deserialize<'de>>(stdout: &str) -> Result<Vec<T>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(stdout)?)
}

/// Parse `ip -json link show dev <name>`.
pub fn parse_link(stdout: &str, name: &str) -> Result<Link> {
    let links: Vec<LinkInfo> = parse_array(stdout)?;
    links
        .into_iter()
        .next()
        .map(|l| Link {
            name: l.ifname,
            flags: l.flags,
        })
        .ok_or_else(|| Error::NotFound {
            message: format!("Device \"{}\" does not exist.", name),
        })
}

/// Parse `ip -json address show dev <name>` into CIDR literals.
pub fn parse_addresses(stdout: &str) -> Result<Vec<String>> {
    let interfaces: Vec<InterfaceInfo> = parse_array(stdout)?;
    Ok(interfaces
        .iter()
        .flat_map(|i| i.addr_info.iter().map(AddressInfo::cidr))
        .collect())
}

/// Parse `ip -json route show dev <name>`.
pub fn parse_routes(stdout: &str) -> Result<Vec<ObservedRoute>> {
    let routes: Vec<RouteInfo> = parse_array(stdout)?;
    Ok(routes.into_iter().map(ObservedRoute::from).collect())
}

/// Parse `ip netns list`.
///
/// Lines look like `ns1 (id: 0)` or just `ns1`.
pub fn parse_netns_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Parse `ip netns pids <name>`: one pid per line.
pub fn parse_pids(stdout: &str) -> Result<Vec<u32>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse()
                .map_err(|_| Error::Parse(format!("invalid pid '{}'", line)))
        })
        .collect()
}
