//! Unit tests for the `edgeboot` CLI binary implementation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use rstest::rstest;

use super::*;

fn config(domain: Option<&str>) -> DeploymentConfig {
    let mut builder = DeploymentConfig::builder().edge("1.2.3.4", 443);
    if let Some(value) = domain {
        builder = builder
            .tunnel_domain(value)
            .tunnel_credential("credential");
    }
    builder
        .build()
        .unwrap_or_else(|err| panic!("build config: {err}"))
}

#[test]
fn render_defaults_to_proxy_configuration() {
    let args = RenderCommand {
        subscription: false,
        domain: None,
    };

    let output = render_output(&args, &config(None)).unwrap_or_else(|err| panic!("{err}"));
    let parsed: serde_json::Value =
        serde_json::from_str(&output).unwrap_or_else(|err| panic!("json: {err}"));

    assert_eq!(parsed["inbounds"][0]["port"], 8001);
}

#[rstest]
#[case::flag(Some("flag.example.com"), None, "flag.example.com")]
#[case::configured(None, Some("edge.example.com"), "edge.example.com")]
#[case::flag_wins(Some("flag.example.com"), Some("edge.example.com"), "flag.example.com")]
fn render_subscription_uses_domain(
    #[case] flag: Option<&str>,
    #[case] configured: Option<&str>,
    #[case] expected: &str,
) {
    let args = RenderCommand {
        subscription: true,
        domain: flag.map(str::to_owned),
    };

    let output = render_output(&args, &config(configured)).unwrap_or_else(|err| panic!("{err}"));
    let text = String::from_utf8(
        STANDARD
            .decode(output)
            .unwrap_or_else(|err| panic!("decode: {err}")),
    )
    .unwrap_or_else(|err| panic!("utf8: {err}"));

    assert!(text.contains(&format!("sni={expected}")));
    assert!(text.contains("#Unknown"));
}

#[test]
fn render_subscription_without_domain_fails() {
    let args = RenderCommand {
        subscription: true,
        domain: None,
    };

    let err = render_output(&args, &config(None)).expect_err("domain is required");

    assert!(matches!(err, CliError::MissingDomain));
}

#[test]
fn domain_flag_requires_subscription() {
    let result = Cli::try_parse_from(["edgeboot", "render", "--domain", "x.example.com"]);

    assert!(result.is_err());
}

#[test]
fn verbose_flag_is_global() {
    let cli = Cli::try_parse_from(["edgeboot", "render", "--verbose"])
        .unwrap_or_else(|err| panic!("parse: {err}"));

    assert!(cli.verbose);
    assert!(matches!(cli.command, Command::Render(_)));
}

#[test]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    write_error(&mut buf, &CliError::MissingDomain);
    let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));

    assert!(
        rendered.contains("pass --domain or set ARGO_DOMAIN"),
        "rendered: {rendered}"
    );
}
