//! In-memory network for exercising the engine without root.
//!
//! [`FakeNetwork`] implements [`StateInspector`] and [`CommandExecutor`] over
//! a model of namespaces and links that behaves like the kernel where the
//! engine can observe it:
//!
//! - Commands aimed at a namespace that does not exist, or at a missing
//!   device, fail with [`Error::NotFound`].
//! - Creating something that already exists fails with
//!   `RTNETLINK answers: File exists`.
//! - Moving a link to another namespace takes it down and drops its
//!   addresses and routes.
//! - Bringing `lo` up assigns `127.0.0.1/8` and `::1/128`.
//! - Deleting a namespace destroys its virtual links (and the other end of
//!   any veth pair) and returns physical links to the default namespace.
//!
//! Every call is logged, so tests can assert on exactly which mutations an
//! apply issued.
//!
//! ```
//! use netnsplan::lab::FakeNetwork;
//! use netnsplan::{DesiredState, Reconciler};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let net = FakeNetwork::new().with_link("eth0");
//! let state = DesiredState::new()
//!     .namespace("ns1", |ns| ns.ethernet("eth0", |d| d.address("192.168.0.1/24")));
//!
//! Reconciler::new(&net).apply(&state).await.unwrap();
//! assert_eq!(net.addresses(&"ns1".into(), "eth0"), ["192.168.0.1/24"]);
//! # });
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::command::{CommandExecutor, Link, ObservedRoute, StateInspector};
use crate::engine::Change;
use crate::error::{Error, Result};
use crate::scope::NamespaceScope;

/// A call received by [`FakeNetwork`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    NamespaceExists { name: String },
    ShowLink { scope: NamespaceScope, name: String },
    ShowAddresses { scope: NamespaceScope, name: String },
    ShowRoutes { scope: NamespaceScope, name: String },
    Mutation(Change),
}

impl Call {
    /// Whether the call changes state.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Mutation(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkKind {
    Loopback,
    Physical,
    Dummy,
    Veth { peer: String },
}

#[derive(Debug, Clone)]
struct FakeLink {
    kind: LinkKind,
    up: bool,
    addresses: Vec<String>,
    routes: Vec<ObservedRoute>,
}

impl FakeLink {
    fn new(kind: LinkKind) -> Self {
        Self {
            kind,
            up: false,
            addresses: Vec::new(),
            routes: Vec::new(),
        }
    }
}

type FailurePredicate = Box<dyn Fn(&Call) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    namespaces: BTreeSet<String>,
    links: HashMap<NamespaceScope, BTreeMap<String, FakeLink>>,
    pids: HashMap<String, Vec<u32>>,
    script_output: String,
    calls: Vec<Call>,
    applied: Vec<Change>,
    fail_on: Vec<FailurePredicate>,
    permission_denied: bool,
}

/// In-memory kernel network state.
#[derive(Default)]
pub struct FakeNetwork {
    state: Mutex<State>,
}

impl std::fmt::Debug for FakeNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FakeNetwork")
            .field("namespaces", &state.namespaces)
            .field("calls", &state.calls.len())
            .finish()
    }
}

fn file_exists() -> Error {
    Error::Command {
        status: 2,
        message: "RTNETLINK answers: File exists".to_string(),
    }
}

fn no_device(name: &str) -> Error {
    Error::NotFound {
        message: format!("Cannot find device \"{}\"", name),
    }
}

fn no_namespace(name: &str) -> Error {
    Error::NotFound {
        message: format!(
            "Cannot open network namespace \"{}\": No such file or directory",
            name
        ),
    }
}

impl State {
    fn check_scope(&self, scope: &NamespaceScope) -> Result<()> {
        match scope.name() {
            Some(ns) if !self.namespaces.contains(ns) => Err(no_namespace(ns)),
            _ => Ok(()),
        }
    }

    fn links_in(&mut self, scope: &NamespaceScope) -> Result<&mut BTreeMap<String, FakeLink>> {
        self.check_scope(scope)?;
        Ok(self.links.entry(scope.clone()).or_default())
    }

    fn link(&self, scope: &NamespaceScope, name: &str) -> Result<&FakeLink> {
        self.check_scope(scope)?;
        self.links
            .get(scope)
            .and_then(|links| links.get(name))
            .ok_or_else(|| Error::NotFound {
                message: format!("Device \"{}\" does not exist.", name),
            })
    }

    fn link_mut(&mut self, scope: &NamespaceScope, name: &str) -> Result<&mut FakeLink> {
        self.links_in(scope)?
            .get_mut(name)
            .ok_or_else(|| no_device(name))
    }

    fn insert_link(&mut self, scope: &NamespaceScope, name: &str, link: FakeLink) -> Result<()> {
        let links = self.links_in(scope)?;
        if links.contains_key(name) {
            return Err(file_exists());
        }
        links.insert(name.to_string(), link);
        Ok(())
    }

    fn apply(&mut self, change: &Change) -> Result<String> {
        match change {
            Change::CreateNamespace { name } => {
                if self.namespaces.contains(name) {
                    return Err(Error::Command {
                        status: 1,
                        message: format!(
                            "Cannot create namespace file \"/var/run/netns/{}\": File exists",
                            name
                        ),
                    });
                }
                self.namespaces.insert(name.clone());
                let scope = NamespaceScope::named(name.as_str());
                self.insert_link(&scope, "lo", FakeLink::new(LinkKind::Loopback))?;
            }
            Change::DeleteNamespace { name } => {
                if !self.namespaces.contains(name) {
                    return Err(Error::NotFound {
                        message: format!(
                            "Cannot remove namespace file \"/var/run/netns/{}\": No such file or directory",
                            name
                        ),
                    });
                }
                if let Some(pids) = self.pids.get(name).filter(|p| !p.is_empty()) {
                    return Err(Error::NamespaceBusy {
                        name: name.clone(),
                        pids: pids.clone(),
                    });
                }
                self.delete_namespace(name);
            }
            Change::SetLinkUp { scope, name } => {
                let link = self.link_mut(scope, name)?;
                link.up = true;
                if link.kind == LinkKind::Loopback && link.addresses.is_empty() {
                    link.addresses = vec!["127.0.0.1/8".to_string(), "::1/128".to_string()];
                }
            }
            Change::AddAddress {
                scope,
                name,
                address,
            } => {
                let link = self.link_mut(scope, name)?;
                if link.addresses.contains(address) {
                    return Err(file_exists());
                }
                link.addresses.push(address.clone());
            }
            Change::AddRoute {
                scope,
                name,
                to,
                via,
            } => {
                let link = self.link_mut(scope, name)?;
                if link.routes.iter().any(|r| r.matches(to, via)) {
                    return Err(file_exists());
                }
                link.routes.push(ObservedRoute {
                    to: to.clone(),
                    via: Some(via.clone()),
                });
            }
            Change::CreateDummyLink { scope, name } => {
                self.insert_link(scope, name, FakeLink::new(LinkKind::Dummy))?;
            }
            Change::CreateVethPair { scope, name, peer } => {
                let links = self.links_in(scope)?;
                if name == peer || links.contains_key(name) || links.contains_key(peer) {
                    return Err(file_exists());
                }
                links.insert(
                    name.clone(),
                    FakeLink::new(LinkKind::Veth { peer: peer.clone() }),
                );
                links.insert(
                    peer.clone(),
                    FakeLink::new(LinkKind::Veth { peer: name.clone() }),
                );
            }
            Change::MoveLink {
                scope,
                name,
                target,
            } => {
                let target_scope = NamespaceScope::named(target.as_str());
                self.link(scope, name).map_err(|_| no_device(name))?;
                if !self.namespaces.contains(target) {
                    return Err(no_namespace(target));
                }
                if self
                    .links
                    .get(&target_scope)
                    .is_some_and(|links| links.contains_key(name))
                {
                    return Err(file_exists());
                }
                let mut link = self
                    .links_in(scope)?
                    .remove(name)
                    .ok_or_else(|| no_device(name))?;
                link.up = false;
                link.addresses.clear();
                link.routes.clear();
                self.insert_link(&target_scope, name, link)?;
            }
            Change::RunPostScript { netns, .. } => {
                if !self.namespaces.contains(netns) {
                    return Err(no_namespace(netns));
                }
                return Ok(self.script_output.clone());
            }
        }
        Ok(String::new())
    }

    fn delete_namespace(&mut self, name: &str) {
        self.namespaces.remove(name);
        let links = self
            .links
            .remove(&NamespaceScope::named(name))
            .unwrap_or_default();

        for (link_name, mut link) in links {
            match link.kind.clone() {
                LinkKind::Physical => {
                    link.up = false;
                    link.addresses.clear();
                    link.routes.clear();
                    self.links
                        .entry(NamespaceScope::Default)
                        .or_default()
                        .insert(link_name, link);
                }
                LinkKind::Veth { peer } => {
                    for other in self.links.values_mut() {
                        let is_peer = other
                            .get(&peer)
                            .is_some_and(|l| l.kind == LinkKind::Veth { peer: link_name.clone() });
                        if is_peer {
                            other.remove(&peer);
                        }
                    }
                }
                LinkKind::Loopback | LinkKind::Dummy => {}
            }
        }
        self.pids.remove(name);
    }
}

impl FakeNetwork {
    /// An empty network: no named namespaces, no links.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn injected(state: &State, call: &Call) -> Option<Error> {
        if state.fail_on.iter().any(|pred| pred(call)) {
            return Some(Error::Command {
                status: 2,
                message: "RTNETLINK answers: injected failure".to_string(),
            });
        }
        if state.permission_denied && call.is_mutation() {
            return Some(Error::PermissionDenied {
                message: "RTNETLINK answers: Operation not permitted".to_string(),
            });
        }
        None
    }

    fn read<T>(&self, call: Call, f: impl FnOnce(&State) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        if let Some(err) = Self::injected(&state, &call) {
            state.calls.push(call);
            return Err(err);
        }
        state.calls.push(call);
        f(&*state)
    }

    fn mutate(&self, change: Change) -> Result<String> {
        let mut state = self.lock();
        let call = Call::Mutation(change.clone());
        if let Some(err) = Self::injected(&state, &call) {
            state.calls.push(call);
            return Err(err);
        }
        state.calls.push(call);
        let output = state.apply(&change)?;
        state.applied.push(change);
        Ok(output)
    }

    // Seeding. None of these are logged.

    /// Add a pre-existing namespace.
    pub fn with_namespace(self, name: &str) -> Self {
        self.insert_namespace(name);
        self
    }

    /// Add a physical link to the default namespace.
    pub fn with_link(self, name: &str) -> Self {
        self.insert_link(&NamespaceScope::Default, name);
        self
    }

    /// Add a pre-existing namespace with a down loopback.
    pub fn insert_namespace(&self, name: &str) {
        let mut state = self.lock();
        if state.namespaces.insert(name.to_string()) {
            state
                .links
                .entry(NamespaceScope::named(name))
                .or_default()
                .insert("lo".to_string(), FakeLink::new(LinkKind::Loopback));
        }
    }

    /// Add a physical link.
    pub fn insert_link(&self, scope: &NamespaceScope, name: &str) {
        self.seed(scope, name, LinkKind::Physical);
    }

    /// Add a dummy link.
    pub fn insert_dummy(&self, scope: &NamespaceScope, name: &str) {
        self.seed(scope, name, LinkKind::Dummy);
    }

    /// Add a veth pair with both ends in `scope`.
    pub fn insert_veth(&self, scope: &NamespaceScope, name: &str, peer: &str) {
        self.seed(scope, name, LinkKind::Veth { peer: peer.to_string() });
        self.seed(scope, peer, LinkKind::Veth { peer: name.to_string() });
    }

    fn seed(&self, scope: &NamespaceScope, name: &str, kind: LinkKind) {
        self.lock()
            .links
            .entry(scope.clone())
            .or_default()
            .insert(name.to_string(), FakeLink::new(kind));
    }

    fn with_link_mut(&self, scope: &NamespaceScope, name: &str, f: impl FnOnce(&mut FakeLink)) {
        if let Some(link) = self
            .lock()
            .links
            .get_mut(scope)
            .and_then(|links| links.get_mut(name))
        {
            f(link);
        }
    }

    /// Set a link up out of band.
    pub fn mark_up(&self, scope: &NamespaceScope, name: &str) {
        self.with_link_mut(scope, name, |link| link.up = true);
    }

    /// Add an address out of band.
    pub fn insert_address(&self, scope: &NamespaceScope, name: &str, cidr: &str) {
        self.with_link_mut(scope, name, |link| link.addresses.push(cidr.to_string()));
    }

    /// Add a route out of band.
    pub fn insert_route(&self, scope: &NamespaceScope, name: &str, to: &str, via: &str) {
        self.with_link_mut(scope, name, |link| {
            link.routes.push(ObservedRoute {
                to: to.to_string(),
                via: Some(via.to_string()),
            })
        });
    }

    /// Pretend processes are running inside `netns`.
    pub fn set_pids(&self, netns: &str, pids: &[u32]) {
        self.lock().pids.insert(netns.to_string(), pids.to_vec());
    }

    /// Output returned by every post-script.
    pub fn set_script_output(&self, output: &str) {
        self.lock().script_output = output.to_string();
    }

    // Failure injection.

    /// Fail every call matching `pred` with a generic command error.
    pub fn fail_on<F>(&self, pred: F)
    where
        F: Fn(&Call) -> bool + Send + Sync + 'static,
    {
        self.lock().fail_on.push(Box::new(pred));
    }

    /// Fail every mutation with [`Error::PermissionDenied`].
    pub fn deny_permission(&self) {
        self.lock().permission_denied = true;
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_on.clear();
        state.permission_denied = false;
    }

    // Inspection.

    /// Named namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.lock().namespaces.iter().cloned().collect()
    }

    /// Whether the named namespace exists.
    pub fn has_namespace(&self, name: &str) -> bool {
        self.lock().namespaces.contains(name)
    }

    /// Link names in `scope`, sorted.
    pub fn links(&self, scope: &NamespaceScope) -> Vec<String> {
        self.lock()
            .links
            .get(scope)
            .map(|links| links.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `name` exists in `scope`.
    pub fn has_link(&self, scope: &NamespaceScope, name: &str) -> bool {
        self.lock()
            .links
            .get(scope)
            .is_some_and(|links| links.contains_key(name))
    }

    /// Whether `name` in `scope` is up. False for a missing link.
    pub fn is_up(&self, scope: &NamespaceScope, name: &str) -> bool {
        self.lock().link(scope, name).is_ok_and(|l| l.up)
    }

    /// Addresses on `name` in `scope`, in assignment order.
    pub fn addresses(&self, scope: &NamespaceScope, name: &str) -> Vec<String> {
        self.lock()
            .link(scope, name)
            .map(|l| l.addresses.clone())
            .unwrap_or_default()
    }

    /// Routes through `name` in `scope`, in assignment order.
    pub fn routes(&self, scope: &NamespaceScope, name: &str) -> Vec<ObservedRoute> {
        self.lock()
            .link(scope, name)
            .map(|l| l.routes.clone())
            .unwrap_or_default()
    }

    /// Every call received, including failed ones.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Mutations that succeeded.
    pub fn mutations(&self) -> Vec<Change> {
        self.lock().applied.clone()
    }

    /// `(netns, script)` for every post-script that ran.
    pub fn scripts(&self) -> Vec<(String, String)> {
        self.lock()
            .applied
            .iter()
            .filter_map(|c| match c {
                Change::RunPostScript { netns, script } => Some((netns.clone(), script.clone())),
                _ => None,
            })
            .collect()
    }

    /// Forget logged calls, keeping network state.
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.applied.clear();
    }
}

impl StateInspector for FakeNetwork {
    async fn namespace_exists(&self, name: &str) -> Result<bool> {
        self.read(
            Call::NamespaceExists {
                name: name.to_string(),
            },
            |state| Ok(state.namespaces.contains(name)),
        )
    }

    async fn show_link(&self, scope: &NamespaceScope, name: &str) -> Result<Link> {
        let call = Call::ShowLink {
            scope: scope.clone(),
            name: name.to_string(),
        };
        self.read(call, |state| {
            let link = state.link(scope, name)?;
            let flags: &[&str] = if link.up { &["UP", "LOWER_UP"] } else { &[] };
            Ok(Link::new(name, flags))
        })
    }

    async fn show_addresses(&self, scope: &NamespaceScope, name: &str) -> Result<Vec<String>> {
        let call = Call::ShowAddresses {
            scope: scope.clone(),
            name: name.to_string(),
        };
        self.read(call, |state| Ok(state.link(scope, name)?.addresses.clone()))
    }

    async fn show_routes(&self, scope: &NamespaceScope, name: &str) -> Result<Vec<ObservedRoute>> {
        let call = Call::ShowRoutes {
            scope: scope.clone(),
            name: name.to_string(),
        };
        self.read(call, |state| Ok(state.link(scope, name)?.routes.clone()))
    }
}

impl CommandExecutor for FakeNetwork {
    async fn create_namespace(&self, name: &str) -> Result<()> {
        self.mutate(Change::CreateNamespace {
            name: name.to_string(),
        })
        .map(|_| ())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.mutate(Change::DeleteNamespace {
            name: name.to_string(),
        })
        .map(|_| ())
    }

    async fn set_link_up(&self, scope: &NamespaceScope, name: &str) -> Result<()> {
        self.mutate(Change::SetLinkUp {
            scope: scope.clone(),
            name: name.to_string(),
        })
        .map(|_| ())
    }

    async fn add_address(&self, scope: &NamespaceScope, name: &str, address: &str) -> Result<()> {
        self.mutate(Change::AddAddress {
            scope: scope.clone(),
            name: name.to_string(),
            address: address.to_string(),
        })
        .map(|_| ())
    }

    async fn add_route(
        &self,
        scope: &NamespaceScope,
        name: &str,
        to: &str,
        via: &str,
    ) -> Result<()> {
        self.mutate(Change::AddRoute {
            scope: scope.clone(),
            name: name.to_string(),
            to: to.to_string(),
            via: via.to_string(),
        })
        .map(|_| ())
    }

    async fn create_dummy_link(&self, scope: &NamespaceScope, name: &str) -> Result<()> {
        self.mutate(Change::CreateDummyLink {
            scope: scope.clone(),
            name: name.to_string(),
        })
        .map(|_| ())
    }

    async fn create_veth_pair(&self, scope: &NamespaceScope, name: &str, peer: &str) -> Result<()> {
        self.mutate(Change::CreateVethPair {
            scope: scope.clone(),
            name: name.to_string(),
            peer: peer.to_string(),
        })
        .map(|_| ())
    }

    async fn move_link_to_namespace(
        &self,
        scope: &NamespaceScope,
        name: &str,
        target: &str,
    ) -> Result<()> {
        self.mutate(Change::MoveLink {
            scope: scope.clone(),
            name: name.to_string(),
            target: target.to_string(),
        })
        .map(|_| ())
    }

    async fn run_in_namespace(&self, namespace: &str, script: &str) -> Result<String> {
        self.mutate(Change::RunPostScript {
            netns: namespace.to_string(),
            script: script.to_string(),
        })
    }
}
