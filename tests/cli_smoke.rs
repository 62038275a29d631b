//! Behavioural smoke tests for the CLI entrypoints.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn cli_without_arguments_prints_help() {
    let mut cmd = cargo_bin_cmd!("edgeboot");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn render_prints_proxy_configuration() {
    let mut cmd = cargo_bin_cmd!("edgeboot");
    cmd.env("UUID", "3b241101-e2bb-4255-8caf-4136c566a962");
    cmd.args(["render"]);

    cmd.assert()
        .success()
        .stdout(contains("\"inbounds\""))
        .stdout(contains("/vless-argo"))
        .stdout(contains("3b241101-e2bb-4255-8caf-4136c566a962"));
}

#[test]
fn render_subscription_requires_a_domain() {
    let mut cmd = cargo_bin_cmd!("edgeboot");
    cmd.env_remove("ARGO_DOMAIN");
    cmd.args(["render", "--subscription"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("pass --domain or set ARGO_DOMAIN"));
}

#[test]
fn render_subscription_prints_base64_document() {
    let mut cmd = cargo_bin_cmd!("edgeboot");
    cmd.args(["render", "--subscription", "--domain", "abc.example.com"]);

    cmd.assert()
        .success()
        .stdout(predicates::str::is_match("^[A-Za-z0-9+/=]+\n$").unwrap_or_else(|err| {
            panic!("pattern: {err}")
        }));
}

#[test]
fn janitor_sweeps_working_directory() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    for name in ["boot.log", "web", "sub.txt"] {
        std::fs::write(tmp.path().join(name), "x").unwrap_or_else(|err| panic!("seed: {err}"));
    }

    let mut cmd = cargo_bin_cmd!("edgeboot-janitor");
    cmd.arg("--workdir").arg(tmp.path());

    cmd.assert()
        .success()
        .stdout(contains("removed=2"));
    assert!(!tmp.path().join("web").exists());
    assert!(tmp.path().join("sub.txt").exists());
}
