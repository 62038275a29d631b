//! Unit tests for binary planning.

use rstest::rstest;

use super::{BinaryRole, BinarySet};
use crate::arch::Architecture;
use crate::config::DeploymentConfig;

#[derive(Clone, Copy, Debug)]
enum Monitoring {
    Off,
    Legacy,
    Current,
}

fn config(monitoring: Monitoring) -> DeploymentConfig {
    let builder = DeploymentConfig::builder().workdir("/srv/app/tmp");
    let configured = match monitoring {
        Monitoring::Off => builder,
        Monitoring::Legacy => builder.monitor("dash.example.com", Some(5555), "key"),
        Monitoring::Current => builder.monitor("dash.example.com:443", None, "key"),
    };
    configured
        .build()
        .unwrap_or_else(|err| panic!("build config: {err}"))
}

#[rstest]
#[case(Architecture::Amd, Monitoring::Off, &[
    "https://amd64.ssss.nyc.mn/web",
    "https://amd64.ssss.nyc.mn/bot",
])]
#[case(Architecture::Arm, Monitoring::Off, &[
    "https://arm64.ssss.nyc.mn/web",
    "https://arm64.ssss.nyc.mn/bot",
])]
#[case(Architecture::Amd, Monitoring::Legacy, &[
    "https://amd64.ssss.nyc.mn/agent",
    "https://amd64.ssss.nyc.mn/web",
    "https://amd64.ssss.nyc.mn/bot",
])]
#[case(Architecture::Arm, Monitoring::Legacy, &[
    "https://arm64.ssss.nyc.mn/agent",
    "https://arm64.ssss.nyc.mn/web",
    "https://arm64.ssss.nyc.mn/bot",
])]
#[case(Architecture::Amd, Monitoring::Current, &[
    "https://amd64.ssss.nyc.mn/v1",
    "https://amd64.ssss.nyc.mn/web",
    "https://amd64.ssss.nyc.mn/bot",
])]
#[case(Architecture::Arm, Monitoring::Current, &[
    "https://arm64.ssss.nyc.mn/v1",
    "https://arm64.ssss.nyc.mn/web",
    "https://arm64.ssss.nyc.mn/bot",
])]
fn plan_requests_exact_url_set(
    #[case] arch: Architecture,
    #[case] monitoring: Monitoring,
    #[case] expected: &[&str],
) {
    let set = BinarySet::plan(&config(monitoring), arch);

    assert_eq!(set.urls(), expected);
}

#[test]
fn plan_is_deterministic() {
    let config = config(Monitoring::Current);

    assert_eq!(
        BinarySet::plan(&config, Architecture::Arm),
        BinarySet::plan(&config, Architecture::Arm)
    );
}

#[test]
fn plan_places_binaries_under_workdir() {
    let set = BinarySet::plan(&config(Monitoring::Legacy), Architecture::Amd);

    let paths: Vec<_> = set.iter().map(|spec| spec.path().as_str()).collect();
    assert_eq!(
        paths,
        vec!["/srv/app/tmp/npm", "/srv/app/tmp/web", "/srv/app/tmp/bot"]
    );
    assert!(set.get(BinaryRole::MonitorAgentV1).is_none());
}

#[test]
fn custom_source_without_placeholder_is_used_verbatim() {
    let config = DeploymentConfig::builder()
        .binary_source("http://mirror.local/bin/")
        .build()
        .unwrap_or_else(|err| panic!("build config: {err}"));

    let set = BinarySet::plan(&config, Architecture::Arm);

    assert_eq!(
        set.urls(),
        vec!["http://mirror.local/bin/web", "http://mirror.local/bin/bot"]
    );
}
