//! Integration tests for configuration loading and validation.

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use edgeboot::config::{
    ConfigError, DEFAULT_BINARY_SOURCE, DEFAULT_EDGE_HOST, DEFAULT_EDGE_PORT,
    DEFAULT_ISP_LOOKUP_URL, DEFAULT_KEEPALIVE_URL, DEFAULT_SUB_PATH, DEFAULT_TUNNEL_PORT,
    DEFAULT_UUID, DEFAULT_WORKDIR, MonitorVariant,
};
use edgeboot::test_support::EnvGuard;
use edgeboot::{DeploymentConfig, Settings, TunnelMode};
use rstest::*;
use tempfile::TempDir;

#[fixture]
fn valid_settings() -> Settings {
    Settings {
        uuid: DEFAULT_UUID.to_owned(),
        argo_domain: None,
        argo_auth: None,
        argo_port: DEFAULT_TUNNEL_PORT,
        nezha_server: None,
        nezha_port: None,
        nezha_key: None,
        cfip: DEFAULT_EDGE_HOST.to_owned(),
        cfport: DEFAULT_EDGE_PORT,
        name: None,
        file_path: DEFAULT_WORKDIR.to_owned(),
        sub_path: DEFAULT_SUB_PATH.to_owned(),
        upload_url: None,
        project_url: None,
        auto_access: false,
        server_port: None,
        port: None,
        binary_source: DEFAULT_BINARY_SOURCE.to_owned(),
        keepalive_url: DEFAULT_KEEPALIVE_URL.to_owned(),
        isp_lookup_url: DEFAULT_ISP_LOOKUP_URL.to_owned(),
    }
}

/// Verifies that validation produces actionable errors mentioning both the
/// environment variable and configuration file for each required field.
#[rstest]
#[case::uuid(|cfg: &mut Settings| cfg.uuid.clear(), "UUID", "uuid")]
#[case::uuid_format(|cfg: &mut Settings| cfg.uuid = String::from("abc"), "UUID", "uuid")]
#[case::edge(|cfg: &mut Settings| cfg.cfip.clear(), "CFIP", "cfip")]
#[case::workdir(|cfg: &mut Settings| cfg.file_path = String::from("  "), "FILE_PATH", "file_path")]
#[case::sub_path(|cfg: &mut Settings| cfg.sub_path = String::from("/"), "SUB_PATH", "sub_path")]
#[case::source(|cfg: &mut Settings| cfg.binary_source.clear(), "BINARY_SOURCE", "binary_source")]
fn validation_errors_are_actionable(
    valid_settings: Settings,
    #[case] mutate: fn(&mut Settings),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_settings;
    mutate(&mut cfg);

    let error = cfg.into_deployment().expect_err("validation should fail");
    let message = error.to_string();

    assert!(
        matches!(error, ConfigError::MissingField(_) | ConfigError::Invalid(_)),
        "unexpected error kind: {error:?}"
    );
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("edgeboot.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
fn server_port_takes_precedence_over_port(valid_settings: Settings) {
    let cfg = Settings {
        server_port: Some(4000),
        port: Some(8080),
        ..valid_settings
    };

    let config = cfg
        .into_deployment()
        .unwrap_or_else(|err| panic!("convert settings: {err}"));

    assert_eq!(config.server_port(), 4000);
}

#[rstest]
fn routing_credential_selects_routing_file_mode(valid_settings: Settings) {
    let cfg = Settings {
        argo_domain: Some(String::from("edge.example.com")),
        argo_auth: Some(String::from(
            r#"{"AccountTag":"a","TunnelSecret":"s","TunnelID":"t"}"#,
        )),
        ..valid_settings
    };

    let config = cfg
        .into_deployment()
        .unwrap_or_else(|err| panic!("convert settings: {err}"));

    assert_eq!(TunnelMode::classify(config.tunnel()), TunnelMode::RoutingFile);
    assert_eq!(config.tunnel().static_domain(), Some("edge.example.com"));
}

#[tokio::test]
async fn config_file_and_environment_are_layered() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let tmp_root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    Dir::open_ambient_dir(&tmp_root, ambient_authority())
        .unwrap_or_else(|err| panic!("open temp dir: {err}"))
        .write(
            "edgeboot.toml",
            concat!(
                "argo_domain = \"file.example.com\"\n",
                "cfport = 2053\n",
                "nezha_server = \"dash.example.com\"\n",
                "nezha_port = \"5555\"\n",
                "nezha_key = \"secret\"\n",
            ),
        )
        .unwrap_or_else(|err| panic!("write config: {err}"));
    let config_path = tmp_root.join("edgeboot.toml");

    let _guard = EnvGuard::deployment(&[
        ("EDGEBOOT_CONFIG_PATH", config_path.as_str()),
        ("CFPORT", "8443"),
        ("NAME", "edge-a"),
    ])
    .await;

    let config = DeploymentConfig::load().unwrap_or_else(|err| panic!("load config: {err}"));

    assert_eq!(config.tunnel().domain(), Some("file.example.com"));
    assert_eq!(config.edge().port(), 8443);
    assert_eq!(config.node_name(), Some("edge-a"));
    assert_eq!(
        config.monitor().map(|monitor| monitor.variant()),
        Some(MonitorVariant::V0 { port: 5555 })
    );
}

#[rstest]
#[tokio::test]
async fn host_environment_does_not_leak_into_guarded_load() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("temp dir: {err}"));
    let empty = tmp.path().join("edgeboot.toml");
    std::fs::write(&empty, "").unwrap_or_else(|err| panic!("write config: {err}"));
    let empty = empty
        .to_str()
        .unwrap_or_else(|| panic!("non-utf8 temp path"));
    let _guard = EnvGuard::deployment(&[("EDGEBOOT_CONFIG_PATH", empty)]).await;

    let config = DeploymentConfig::load().unwrap_or_else(|err| panic!("load config: {err}"));

    assert_eq!(config.uuid(), DEFAULT_UUID);
    assert_eq!(config.edge().port(), DEFAULT_EDGE_PORT);
    assert_eq!(config.tunnel().domain(), None);
    assert_eq!(config.node_name(), None);
}
