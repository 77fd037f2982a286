//! Command transport backed by the iproute2 `ip` binary.
//!
//! [`IpCommand`] implements [`StateInspector`] and [`CommandExecutor`] by
//! running `ip` once per call. A [`NamespaceScope::Named`] scope becomes
//! `ip -n <netns> ...`, so the namespace a command targets is visible in its
//! argument list and nothing about the process changes between calls.
//!
//! ```ignore
//! use netnsplan::iproute2::IpCommand;
//! use netnsplan::{NamespaceScope, StateInspector};
//!
//! let ip = IpCommand::new("/bin/ip");
//! let link = ip.show_link(&NamespaceScope::named("ns1"), "eth0").await?;
//! println!("{} up={}", link.name, link.is_up());
//! ```

mod json;
mod runner;

pub use json::{
    AddressInfo, InterfaceInfo, LinkInfo, RouteInfo, parse_addresses, parse_link,
    parse_netns_list, parse_pids, parse_routes,
};

use std::path::{Path, PathBuf};

use crate::command::{CommandExecutor, Link, ObservedRoute, StateInspector};
use crate::error::{Error, Result};
use crate::scope::NamespaceScope;

/// Default location of the `ip` binary.
pub const DEFAULT_IP_PATH: &str = "/bin/ip";

/// Shell used for post-scripts.
const SHELL: &str = "/bin/sh";

/// `ip route show` without a family flag lists IPv4 routes only.
const ROUTE_FAMILIES: [&str; 2] = ["-4", "-6"];

/// Runs `ip` as a subprocess.
#[derive(Debug, Clone)]
pub struct IpCommand {
    path: PathBuf,
}

impl Default for IpCommand {
    fn default() -> Self {
        Self::new(DEFAULT_IP_PATH)
    }
}

impl IpCommand {
    /// Use the `ip` binary at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the `ip` binary.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `ip` in `scope` and return stdout.
    async fn ip(&self, scope: &NamespaceScope, args: &[&str]) -> Result<String> {
        let args = scoped_args(scope, args);
        let out = runner::run(&self.path, &args, None)
            .await
            .map_err(runner::classify)?;

        if !out.stderr.trim().is_empty() {
            tracing::warn!(msg = %out.stderr.trim_end(), "ip command warning");
        }

        Ok(out.stdout)
    }

    /// Run `ip` in `scope`, discarding stdout.
    async fn exec(&self, scope: &NamespaceScope, args: &[&str]) -> Result<()> {
        self.ip(scope, args).await.map(|_| ())
    }

    /// List named namespaces.
    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        let out = self.ip(&NamespaceScope::Default, &["netns", "list"]).await?;
        Ok(parse_netns_list(&out))
    }

    /// Processes running inside a namespace.
    pub async fn namespace_pids(&self, name: &str) -> Result<Vec<u32>> {
        let out = self
            .ip(&NamespaceScope::Default, &["netns", "pids", name])
            .await?;
        parse_pids(&out)
    }
}

/// Prefix `args` with `-n <netns>` for a named scope.
fn scoped_args<'a>(scope: &'a NamespaceScope, args: &[&'a str]) -> Vec<&'a str> {
    let mut full = Vec::with_capacity(args.len() + 2);
    if let Some(netns) = scope.name() {
        full.extend(["-n", netns]);
    }
    full.extend_from_slice(args);
    full
}

impl StateInspector for IpCommand {
    async fn namespace_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_namespaces().await?.iter().any(|n| n == name))
    }

    async fn show_link(&self, scope: &NamespaceScope, name: &str) -> Result<Link> {
        let out = self.ip(scope, &["-json", "link", "show", "dev", name]).await?;
        parse_link(&out, name)
    }

    async fn show_addresses(&self, scope: &NamespaceScope, name: &str) -> Result<Vec<String>> {
        let out = self
            .ip(scope, &["-json", "address", "show", "dev", name])
            .await?;
        parse_addresses(&out)
    }

    async fn show_routes(&self, scope: &NamespaceScope, name: &str) -> Result<Vec<ObservedRoute>> {
        let mut routes = Vec::new();
        for family in ROUTE_FAMILIES {
            let out = self
                .ip(scope, &["-json", family, "route", "show", "dev", name])
                .await?;
            routes.extend(parse_routes(&out)?);
        }
        Ok(routes)
    }
}

impl CommandExecutor for IpCommand {
    async fn create_namespace(&self, name: &str) -> Result<()> {
        self.exec(&NamespaceScope::Default, &["netns", "add", name])
            .await
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let pids = self.namespace_pids(name).await?;
        if !pids.is_empty() {
            return Err(Error::NamespaceBusy {
                name: name.to_string(),
                pids,
            });
        }

        self.exec(&NamespaceScope::Default, &["netns", "del", name])
            .await
    }

    async fn set_link_up(&self, scope: &NamespaceScope, name: &str) -> Result<()> {
        self.exec(scope, &["link", "set", "dev", name, "up"]).await
    }

    async fn add_address(&self, scope: &NamespaceScope, name: &str, address: &str) -> Result<()> {
        self.exec(scope, &["address", "add", address, "dev", name])
            .await
    }

    async fn add_route(
        &self,
        scope: &NamespaceScope,
        name: &str,
        to: &str,
        via: &str,
    ) -> Result<()> {
        self.exec(scope, &["route", "add", to, "via", via, "dev", name])
            .await
    }

    async fn create_dummy_link(&self, scope: &NamespaceScope, name: &str) -> Result<()> {
        self.exec(scope, &["link", "add", "name", name, "type", "dummy"])
            .await
    }

    async fn create_veth_pair(&self, scope: &NamespaceScope, name: &str, peer: &str) -> Result<()> {
        self.exec(
            scope,
            &["link", "add", "name", name, "type", "veth", "peer", "name", peer],
        )
        .await
    }

    async fn move_link_to_namespace(
        &self,
        scope: &NamespaceScope,
        name: &str,
        target: &str,
    ) -> Result<()> {
        self.exec(scope, &["link", "set", "dev", name, "netns", target])
            .await
    }

    async fn run_in_namespace(&self, namespace: &str, script: &str) -> Result<String> {
        let args = ["netns", "exec", namespace, SHELL];
        // script failures are reported as-is, not classified like `ip` errors
        let out = runner::capture(&self.path, &args, Some(script)).await?;
        if !out.success() {
            tracing::debug!(
                netns = %namespace,
                output = %out.stdout,
                stderr = %out.stderr,
                "post-script output"
            );
            return Err(out.into_error());
        }
        Ok(out.stdout)
    }
}
