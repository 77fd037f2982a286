//! Re-runs, additivity and resuming after a failure.

use netnsplan::lab::{Call, FakeNetwork};
use netnsplan::{Change, DesiredState, Result};

use crate::common::{apply, default_ns, dummy_and_veth_state, ethernet_state, ns, veth_state};

#[tokio::test]
async fn test_second_apply_is_a_no_op() -> Result<()> {
    for state in [ethernet_state(), veth_state(), dummy_and_veth_state()] {
        let net = FakeNetwork::new().with_link("eth0");
        apply(&net, &state).await?;
        net.clear_log();

        let result = apply(&net, &state).await?;

        assert!(result.is_empty(), "{}", result.summary_text());
        assert_no_mutations!(net);
    }
    Ok(())
}

#[tokio::test]
async fn test_existing_addresses_are_kept() -> Result<()> {
    let net = FakeNetwork::new().with_link("eth0");
    apply(&net, &ethernet_state()).await?;

    // an operator adds state the configuration does not mention
    net.insert_address(&ns("ns1"), "eth0", "172.16.0.1/24");
    net.insert_route(&ns("ns1"), "eth0", "10.0.0.0/8", "192.168.0.253");
    net.clear_log();

    let result = apply(&net, &ethernet_state()).await?;

    assert!(result.is_empty());
    assert_eq!(
        net.addresses(&ns("ns1"), "eth0"),
        ["192.168.0.1/24", "172.16.0.1/24"]
    );
    assert_eq!(net.routes(&ns("ns1"), "eth0").len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_dual_stack_second_apply_is_a_no_op() -> Result<()> {
    let state = DesiredState::new().namespace("ns1", |ns| {
        ns.dummy("dummy0", |d| {
            d.address("10.0.0.1/8")
                .address("2001:db8::1/64")
                .route("10.1.0.0/16", "10.0.0.254")
                .route("2001:db8:1::/64", "2001:db8::fe")
        })
    });
    let net = FakeNetwork::new();
    apply(&net, &state).await?;
    assert_eq!(net.routes(&ns("ns1"), "dummy0").len(), 2);
    net.clear_log();

    let result = apply(&net, &state).await?;

    assert!(result.is_empty(), "{}", result.summary_text());
    assert_no_mutations!(net);
    Ok(())
}

#[tokio::test]
async fn test_missing_address_is_restored() -> Result<()> {
    let net = FakeNetwork::new().with_namespace("ns1");
    net.insert_dummy(&ns("ns1"), "dummy0");
    net.mark_up(&ns("ns1"), "dummy0");

    let result = apply(&net, &dummy_and_veth_state()).await?;

    assert!(result.changes.contains(&Change::AddAddress {
        scope: ns("ns1"),
        name: "dummy0".into(),
        address: "10.0.0.1/8".into()
    }));
    assert!(!result.changes.iter().any(|c| matches!(c, Change::CreateDummyLink { .. })));
    assert!(!result.changes.iter().any(|c| matches!(
        c,
        Change::SetLinkUp { name, .. } if name == "dummy0"
    )));
    Ok(())
}

#[tokio::test]
async fn test_resume_after_failed_move() -> Result<()> {
    let net = FakeNetwork::new();
    net.fail_on(|call| {
        matches!(
            call,
            Call::Mutation(Change::MoveLink { name, .. }) if name == "veth0-peer"
        )
    });

    let err = apply(&net, &veth_state()).await.unwrap_err();
    assert_eq!(err.exit_status(), Some(2));
    // the pair exists, the peer is stranded in the default namespace
    assert!(net.has_link(&ns("ns1"), "veth0"));
    assert!(net.has_link(&default_ns(), "veth0-peer"));

    net.clear_failures();
    net.clear_log();
    let result = apply(&net, &veth_state()).await?;

    assert!(!result.changes.iter().any(|c| matches!(c, Change::CreateVethPair { .. })));
    assert!(result.changes.contains(&Change::MoveLink {
        scope: default_ns(),
        name: "veth0-peer".into(),
        target: "ns2".into()
    }));
    assert_eq!(net.links(&ns("ns2")), ["lo", "veth0-peer"]);
    assert_eq!(net.addresses(&ns("ns2"), "veth0-peer"), ["192.168.10.2/24"]);
    Ok(())
}

#[tokio::test]
async fn test_resume_after_pair_created() -> Result<()> {
    let net = FakeNetwork::new()
        .with_namespace("ns1")
        .with_namespace("ns2");
    net.insert_veth(&default_ns(), "veth0", "veth0-peer");

    let result = apply(&net, &veth_state()).await?;

    assert!(!result.changes.iter().any(|c| matches!(c, Change::CreateVethPair { .. })));
    assert_eq!(net.links(&ns("ns1")), ["lo", "veth0"]);
    assert_eq!(net.links(&ns("ns2")), ["lo", "veth0-peer"]);
    Ok(())
}

#[tokio::test]
async fn test_ethernet_already_in_namespace_is_not_moved() -> Result<()> {
    let net = FakeNetwork::new().with_namespace("ns1");
    net.insert_link(&ns("ns1"), "eth0");

    let result = apply(&net, &ethernet_state()).await?;

    assert!(!result.changes.iter().any(|c| matches!(c, Change::MoveLink { .. })));
    assert_eq!(net.addresses(&ns("ns1"), "eth0"), ["192.168.0.1/24"]);
    Ok(())
}
