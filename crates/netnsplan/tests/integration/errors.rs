//! Error propagation and validation.

use netnsplan::lab::{Call, FakeNetwork};
use netnsplan::{Change, DesiredState, Error, ErrorKind};

use crate::common::{apply, ethernet_state, ns, veth_state};

#[tokio::test]
async fn test_permission_denied_aborts() {
    let net = FakeNetwork::new().with_link("eth0");
    net.deny_permission();

    let err = apply(&net, &ethernet_state()).await.unwrap_err();

    assert!(err.is_permission_denied());
    assert_eq!(
        err.to_string(),
        "create netns ns1: operation not permitted: RTNETLINK answers: Operation not permitted"
    );
    // nothing after the first failure is attempted
    let mutations = net.calls().into_iter().filter(Call::is_mutation).count();
    assert_eq!(mutations, 1);
}

#[tokio::test]
async fn test_missing_ethernet_is_fatal() {
    let net = FakeNetwork::new();

    let err = apply(&net, &ethernet_state()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("set netns eth0"));
    // phase 1 already ran
    assert!(net.has_namespace("ns1"));
}

#[tokio::test]
async fn test_failure_mid_device_keeps_earlier_changes() {
    let net = FakeNetwork::new().with_link("eth0");
    net.fail_on(|call| matches!(call, Call::Mutation(Change::AddRoute { .. })));

    let err = apply(&net, &ethernet_state()).await.unwrap_err();

    assert_eq!(err.exit_status(), Some(2));
    assert!(err.to_string().starts_with("add route default via 192.168.0.254 dev eth0 in netns ns1: "));
    assert_eq!(net.addresses(&ns("ns1"), "eth0"), ["192.168.0.1/24"]);
}

#[tokio::test]
async fn test_query_failure_is_not_treated_as_absent() {
    let net = FakeNetwork::new();
    net.fail_on(|call| matches!(call, Call::ShowLink { name, .. } if name == "veth0"));

    let err = apply(&net, &veth_state()).await.unwrap_err();

    assert!(!err.is_not_found());
    assert!(
        !net
            .mutations()
            .iter()
            .any(|c| matches!(c, Change::CreateVethPair { .. }))
    );
}

#[tokio::test]
async fn test_invalid_state_fails_before_any_call() {
    let net = FakeNetwork::new();
    let state = DesiredState::new()
        .namespace("ns1", |ns| {
            ns.dummy("dummy0", |d| d.address("10.0.0.1"))
                .veth("veth0", "dummy0", |v| v.peer_netns("ns1"))
        });

    let err = apply(&net, &state).await.unwrap_err();

    let Error::Validation(errors) = &err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(errors.len(), 2);
    assert!(net.calls().is_empty());
}

#[tokio::test]
async fn test_duplicate_peer_name_in_default_namespace() {
    let net = FakeNetwork::new();
    let state = DesiredState::new()
        .namespace("ns1", |ns| ns.veth("veth0", "host0", |v| v))
        .namespace("ns2", |ns| ns.veth("veth0", "host0", |v| v));

    let err = apply(&net, &state).await.unwrap_err();

    assert!(err.to_string().contains("link name 'host0' in the default netns is already used"));
    assert!(net.calls().is_empty());
}
