//! Namespace teardown.

use netnsplan::lab::FakeNetwork;
use netnsplan::{Change, Error, Reconciler, Result};

use crate::common::{apply, default_ns, ethernet_state, veth_state};

#[tokio::test]
async fn test_destroy_after_apply() -> Result<()> {
    let net = FakeNetwork::new().with_link("eth0");
    apply(&net, &ethernet_state()).await?;

    let result = Reconciler::new(&net).destroy(&ethernet_state()).await?;

    assert_eq!(
        result.changes,
        [Change::DeleteNamespace { name: "ns1".into() }]
    );
    assert!(net.namespaces().is_empty());
    // the physical NIC falls back to the default namespace
    assert_eq!(net.links(&default_ns()), ["eth0"]);
    Ok(())
}

#[tokio::test]
async fn test_destroy_removes_both_veth_ends() -> Result<()> {
    let net = FakeNetwork::new();
    apply(&net, &veth_state()).await?;

    Reconciler::new(&net).destroy(&veth_state()).await?;

    assert!(net.namespaces().is_empty());
    assert!(net.links(&default_ns()).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_destroy_nothing_to_do() -> Result<()> {
    let net = FakeNetwork::new().with_namespace("unrelated");

    let result = Reconciler::new(&net).destroy(&veth_state()).await?;

    assert!(result.is_empty());
    assert_eq!(net.namespaces(), ["unrelated"]);
    Ok(())
}

#[tokio::test]
async fn test_destroy_refuses_busy_namespace() {
    let net = FakeNetwork::new();
    apply(&net, &veth_state()).await.unwrap();
    net.set_pids("ns2", &[4242]);

    let err = Reconciler::new(&net).destroy(&veth_state()).await.unwrap_err();

    assert!(matches!(err.root(), Error::NamespaceBusy { name, .. } if name == "ns2"));
    // ns1 sorts first and is already gone
    assert_eq!(net.namespaces(), ["ns2"]);
}

#[tokio::test]
async fn test_apply_after_destroy_starts_over() -> Result<()> {
    let net = FakeNetwork::new().with_link("eth0");
    apply(&net, &ethernet_state()).await?;
    Reconciler::new(&net).destroy(&ethernet_state()).await?;
    net.clear_log();

    let result = apply(&net, &ethernet_state()).await?;

    assert_eq!(result.changes_made(), 6);
    Ok(())
}
