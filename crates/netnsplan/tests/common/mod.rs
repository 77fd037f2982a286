//! Common test utilities for integration tests.
//!
//! Provides `ConfigDir` for on-disk configuration, the reference desired
//! states used across test modules, and assertion macros.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use netnsplan::lab::FakeNetwork;
use netnsplan::{ApplyOptions, ApplyResult, DesiredState, NamespaceScope, Reconciler, Result};

/// A temporary configuration directory, removed on drop.
pub struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    /// Create an empty directory.
    pub fn new(prefix: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("netnsplan-{}-", prefix))
            .tempdir()
            .expect("create config dir");
        Self { dir }
    }

    /// Write `contents` to `name` inside the directory.
    pub fn file(self, name: &str, contents: &str) -> Self {
        fs::write(self.dir.path().join(name), contents).expect("write config file");
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn ns(name: &str) -> NamespaceScope {
    NamespaceScope::named(name)
}

pub fn default_ns() -> NamespaceScope {
    NamespaceScope::Default
}

/// Apply with default options.
pub async fn apply(net: &FakeNetwork, state: &DesiredState) -> Result<ApplyResult> {
    Reconciler::new(net).apply(state).await
}

/// Apply with `always_run_post_script` set.
pub async fn apply_always_run(net: &FakeNetwork, state: &DesiredState) -> Result<ApplyResult> {
    let options = ApplyOptions {
        always_run_post_script: true,
    };
    Reconciler::with_options(net, options).apply(state).await
}

/// One namespace owning a physical NIC with an address and default route.
pub fn ethernet_state() -> DesiredState {
    DesiredState::new().namespace("ns1", |ns| {
        ns.ethernet("eth0", |d| {
            d.address("192.168.0.1/24")
                .route("default", "192.168.0.254")
        })
    })
}

/// Two namespaces joined by a veth pair.
pub fn veth_state() -> DesiredState {
    DesiredState::new()
        .namespace("ns1", |ns| {
            ns.veth("veth0", "veth0-peer", |v| {
                v.address("192.168.10.1/24")
                    .peer_netns("ns2")
                    .peer_address("192.168.10.2/24")
            })
        })
        .namespace("ns2", |ns| ns)
}

/// Two namespaces with a dummy device and a cross-namespace veth pair.
pub fn dummy_and_veth_state() -> DesiredState {
    DesiredState::new()
        .namespace("ns1", |ns| ns.dummy("dummy0", |d| d.address("10.0.0.1/8")))
        .namespace("ns2", |ns| {
            ns.veth("veth0", "veth0-peer", |v| {
                v.address("192.168.20.1/24")
                    .peer_netns("ns1")
                    .peer_address("192.168.20.2/24")
            })
        })
}

/// Assert that the network received no mutating call since the log was last
/// cleared.
#[macro_export]
macro_rules! assert_no_mutations {
    ($net:expr) => {
        let mutations: Vec<_> = $net.calls().into_iter().filter(|c| c.is_mutation()).collect();
        assert!(mutations.is_empty(), "unexpected mutations: {:?}", mutations);
    };
}
