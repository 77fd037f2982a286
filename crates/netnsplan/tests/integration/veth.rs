//! Veth pair placement across namespaces.

use netnsplan::lab::FakeNetwork;
use netnsplan::{Change, DesiredState, Result};

use crate::common::{apply, default_ns, ns};

/// `first` declares a veth whose peer lives in `second`.
fn forward_reference(first: &str, second: &str) -> DesiredState {
    DesiredState::new()
        .namespace(first, |ns| {
            ns.veth("veth0", "veth0-peer", |v| {
                v.address("10.1.0.1/24")
                    .peer_netns(second)
                    .peer_address("10.1.0.2/24")
            })
        })
        .namespace(second, |ns| ns)
}

#[tokio::test]
async fn test_peer_namespace_declared_later() -> Result<()> {
    // "a" is provisioned before "z", but "z" must already exist
    let net = FakeNetwork::new();
    apply(&net, &forward_reference("a", "z")).await?;

    assert_eq!(net.links(&ns("a")), ["lo", "veth0"]);
    assert_eq!(net.links(&ns("z")), ["lo", "veth0-peer"]);
    Ok(())
}

#[tokio::test]
async fn test_peer_namespace_declared_earlier() -> Result<()> {
    let net = FakeNetwork::new();
    apply(&net, &forward_reference("z", "a")).await?;

    assert_eq!(net.links(&ns("z")), ["lo", "veth0"]);
    assert_eq!(net.links(&ns("a")), ["lo", "veth0-peer"]);
    Ok(())
}

#[tokio::test]
async fn test_peer_namespace_created_out_of_band() -> Result<()> {
    let net = FakeNetwork::new().with_namespace("z");

    let result = apply(&net, &forward_reference("a", "z")).await?;

    assert_eq!(
        result
            .changes
            .iter()
            .filter(|c| matches!(c, Change::CreateNamespace { .. }))
            .count(),
        1
    );
    assert_eq!(net.links(&ns("z")), ["lo", "veth0-peer"]);
    Ok(())
}

#[tokio::test]
async fn test_peer_stays_in_default_namespace() -> Result<()> {
    let net = FakeNetwork::new();
    let state = DesiredState::new().namespace("ns1", |ns| {
        ns.veth("veth0", "veth0-host", |v| {
            v.address("172.31.0.2/30")
                .route("default", "172.31.0.1")
                .peer_address("172.31.0.1/30")
        })
    });

    let result = apply(&net, &state).await?;

    assert_eq!(net.links(&default_ns()), ["veth0-host"]);
    assert!(net.is_up(&default_ns(), "veth0-host"));
    assert_eq!(net.addresses(&default_ns(), "veth0-host"), ["172.31.0.1/30"]);
    assert_eq!(
        result
            .changes
            .iter()
            .filter(|c| matches!(c, Change::MoveLink { .. }))
            .count(),
        1
    );

    net.clear_log();
    assert!(apply(&net, &state).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_peer_in_same_namespace() -> Result<()> {
    let net = FakeNetwork::new();
    let state = DesiredState::new().namespace("ns1", |ns| {
        ns.veth("veth0", "veth1", |v| {
            v.address("10.9.0.1/31")
                .peer_netns("ns1")
                .peer_address("10.9.0.0/31")
        })
    });

    apply(&net, &state).await?;

    assert_eq!(net.links(&ns("ns1")), ["lo", "veth0", "veth1"]);
    assert_eq!(net.addresses(&ns("ns1"), "veth1"), ["10.9.0.0/31"]);

    net.clear_log();
    assert!(apply(&net, &state).await?.is_empty());
    assert_no_mutations!(net);
    Ok(())
}

#[tokio::test]
async fn test_veth_order_of_operations() -> Result<()> {
    let net = FakeNetwork::new()
        .with_namespace("ns1")
        .with_namespace("ns2");
    net.mark_up(&ns("ns1"), "lo");
    net.mark_up(&ns("ns2"), "lo");
    let state = DesiredState::new()
        .namespace("ns1", |ns| {
            ns.veth("veth0", "veth0-peer", |v| v.peer_netns("ns2"))
        })
        .namespace("ns2", |ns| ns);

    let result = apply(&net, &state).await?;

    assert_eq!(
        result.summary_text(),
        "add veth device veth0 peer veth0-peer in default netns\n\
         set netns veth0 from default netns to ns1\n\
         link up veth0 in netns ns1\n\
         set netns veth0-peer from default netns to ns2\n\
         link up veth0-peer in netns ns2"
    );
    Ok(())
}
