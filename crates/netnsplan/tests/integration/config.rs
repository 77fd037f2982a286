//! Loading configuration directories.

use netnsplan::config::{self, DesiredState};
use netnsplan::lab::FakeNetwork;
use netnsplan::{Error, Result};

use crate::common::{ConfigDir, apply, ns};

const BASE: &str = r#"
netns:
  ns1:
    ethernets:
      eth0:
        addresses:
          - 192.168.0.1/24
        routes:
          - to: default
            via: 192.168.0.254
    post-script: |
      echo "ns1 ready"
"#;

const DUMMY: &str = r#"
netns:
  ns1:
    dummy-devices:
      dummy0:
        addresses:
          - 10.0.0.1/8
"#;

const VETH: &str = r#"
netns:
  ns2:
    veth-devices:
      veth0:
        addresses:
          - 192.168.20.1/24
        peer:
          name: veth0-peer
          netns: ns1
          addresses:
            - 192.168.20.2/24
"#;

#[test]
fn test_load_merges_files_in_name_order() -> Result<()> {
    let dir = ConfigDir::new("merge")
        .file("20-veth.yaml", VETH)
        .file("00-base.yaml", BASE)
        .file("10-dummy.yaml", DUMMY)
        .file("README.md", "not: [valid")
        .file("99-empty.yaml", "");

    let state = config::load_dir(dir.path())?;

    assert_eq!(state.netns.keys().collect::<Vec<_>>(), ["ns1", "ns2"]);
    let ns1 = &state.netns["ns1"];
    assert!(ns1.ethernets.contains_key("eth0"));
    assert!(ns1.dummy_devices.contains_key("dummy0"));
    assert_eq!(ns1.script(), Some("echo \"ns1 ready\"\n"));
    assert_eq!(state.netns["ns2"].veth_devices["veth0"].peer.name, "veth0-peer");
    Ok(())
}

#[test]
fn test_later_file_overrides_scalars() -> Result<()> {
    let dir = ConfigDir::new("override")
        .file("00-base.yaml", BASE)
        .file("50-script.yaml", "netns:\n  ns1:\n    post-script: echo override\n");

    let state = config::load_dir(dir.path())?;

    assert_eq!(state.netns["ns1"].script(), Some("echo override"));
    assert_eq!(state.netns["ns1"].ethernets["eth0"].routes.len(), 1);
    Ok(())
}

#[test]
fn test_empty_directory() -> Result<()> {
    let dir = ConfigDir::new("empty");
    assert!(config::load_dir(dir.path())?.is_empty());
    Ok(())
}

#[test]
fn test_broken_file_names_the_path() {
    let dir = ConfigDir::new("broken").file("00-bad.yaml", "netns: [unterminated");

    let err = config::load_dir(dir.path()).unwrap_err();

    assert!(matches!(err.root(), Error::Yaml(_)));
    assert!(err.to_string().contains("00-bad.yaml"));
}

#[test]
fn test_unknown_section_rejected() {
    let dir = ConfigDir::new("unknown").file("00-bridge.yaml", "netns:\n  ns1:\n    bridges: {}\n");
    assert!(config::load_dir(dir.path()).is_err());
}

#[test]
fn test_show_output_reloads() -> Result<()> {
    let dir = ConfigDir::new("show")
        .file("00-base.yaml", BASE)
        .file("10-dummy.yaml", DUMMY);
    let state = config::load_dir(dir.path())?;

    let text = state.to_yaml_string()?;

    assert_eq!(DesiredState::from_yaml_str(&text)?, state);
    Ok(())
}

#[tokio::test]
async fn test_apply_loaded_directory() -> Result<()> {
    let dir = ConfigDir::new("apply")
        .file("00-base.yaml", BASE)
        .file("10-dummy.yaml", DUMMY)
        .file("20-veth.yaml", VETH);
    let state = config::load_dir(dir.path())?;
    let net = FakeNetwork::new().with_link("eth0");

    apply(&net, &state).await?;

    assert_eq!(net.links(&ns("ns1")), ["dummy0", "eth0", "lo", "veth0-peer"]);
    assert_eq!(net.links(&ns("ns2")), ["lo", "veth0"]);
    assert_eq!(net.scripts().len(), 1);
    Ok(())
}
