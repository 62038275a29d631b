//! Unit tests for subscription rendering.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rstest::{fixture, rstest};
use serde_json::Value;

use super::{IspFingerprint, SubscriptionBuilder, SubscriptionRecord};
use crate::config::DeploymentConfig;
use crate::tunnel::{DomainSource, TunnelDescriptor};

const UUID: &str = "3b241101-e2bb-4255-8caf-4136c566a962";

fn config(name: Option<&str>) -> DeploymentConfig {
    let mut builder = DeploymentConfig::builder()
        .uuid(UUID)
        .edge("1.2.3.4", 443);
    if let Some(value) = name {
        builder = builder.node_name(value);
    }
    builder
        .build()
        .unwrap_or_else(|err| panic!("build config: {err}"))
}

#[fixture]
fn tunnel() -> TunnelDescriptor {
    TunnelDescriptor::new("abc.example.com", DomainSource::LogScraped)
}

fn build(config: &DeploymentConfig, tunnel: &TunnelDescriptor) -> SubscriptionRecord {
    SubscriptionBuilder::new(config)
        .build(tunnel, &IspFingerprint::from_parts("US", "Example Net"))
        .unwrap_or_else(|err| panic!("build subscription: {err}"))
}

#[rstest]
fn unnamed_node_uses_fingerprint_label(tunnel: TunnelDescriptor) {
    let record = build(&config(None), &tunnel);

    assert!(record.vless().contains(&format!("{UUID}@1.2.3.4:443")));
    assert!(record.vless().contains("sni=abc.example.com"));
    assert!(record.vless().ends_with("#US-Example_Net"));
    assert!(record.trojan().contains(&format!("{UUID}@1.2.3.4:443")));
    assert!(record.trojan().contains("sni=abc.example.com"));
    assert!(record.trojan().ends_with("#US-Example_Net"));
}

#[rstest]
fn named_node_prefixes_label(tunnel: TunnelDescriptor) {
    let record = build(&config(Some("edge-a")), &tunnel);

    assert!(record.vless().ends_with("#edge-a-US-Example_Net"));
}

#[rstest]
fn vless_uri_matches_client_format(tunnel: TunnelDescriptor) {
    let record = build(&config(None), &tunnel);

    assert_eq!(
        record.vless(),
        format!(
            "vless://{UUID}@1.2.3.4:443?encryption=none&security=tls&sni=abc.example.com\
             &fp=firefox&type=ws&host=abc.example.com&path=%2Fvless-argo%3Fed%3D2560\
             #US-Example_Net"
        )
    );
}

#[rstest]
fn vmess_descriptor_keeps_field_order(tunnel: TunnelDescriptor) {
    let record = build(&config(None), &tunnel);

    let encoded = record
        .vmess()
        .strip_prefix("vmess://")
        .unwrap_or_else(|| panic!("missing vmess scheme"));
    let json = String::from_utf8(
        STANDARD
            .decode(encoded)
            .unwrap_or_else(|err| panic!("decode: {err}")),
    )
    .unwrap_or_else(|err| panic!("utf8: {err}"));
    let parsed: Value = serde_json::from_str(&json).unwrap_or_else(|err| panic!("json: {err}"));

    assert!(json.starts_with(r#"{"v":"2","ps":"US-Example_Net","add":"1.2.3.4","port":"443""#));
    assert_eq!(parsed["path"], "/vmess-argo?ed=2560");
    assert_eq!(parsed["type"], "none");
    assert_eq!(parsed["fp"], "firefox");
}

#[rstest]
fn document_is_base64_of_blank_line_separated_text(tunnel: TunnelDescriptor) {
    let record = build(&config(None), &tunnel);

    let decoded = STANDARD
        .decode(record.document())
        .unwrap_or_else(|err| panic!("decode: {err}"));

    assert_eq!(decoded, record.text().as_bytes());
    assert_eq!(
        record.text(),
        format!("{}\n\n{}\n\n{}\n", record.vless(), record.vmess(), record.trojan())
    );
}

#[rstest]
fn build_is_deterministic(tunnel: TunnelDescriptor) {
    let config = config(Some("edge-a"));

    assert_eq!(build(&config, &tunnel), build(&config, &tunnel));
}

#[test]
fn fingerprint_replaces_spaces() {
    assert_eq!(
        IspFingerprint::from_parts("DE", "Hetzner Online GmbH").as_str(),
        "DE-Hetzner_Online_GmbH"
    );
    assert_eq!(IspFingerprint::unknown().as_str(), "Unknown");
}
