//! BDD scenarios for tunnel hostname resolution.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ResolutionContext, resolution_context};

#[scenario(
    path = "tests/features/tunnel_resolution.feature",
    name = "Configured domain resolves without reading the log"
)]
fn scenario_static_domain(resolution_context: ResolutionContext) {
    drop(resolution_context);
}

#[scenario(
    path = "tests/features/tunnel_resolution.feature",
    name = "Hostname appears in the first log scan"
)]
fn scenario_first_scan(resolution_context: ResolutionContext) {
    drop(resolution_context);
}

#[scenario(
    path = "tests/features/tunnel_resolution.feature",
    name = "Hostname appears after a relaunch"
)]
fn scenario_after_relaunch(resolution_context: ResolutionContext) {
    drop(resolution_context);
}

#[scenario(
    path = "tests/features/tunnel_resolution.feature",
    name = "Silent tunnel exhausts the attempt budget"
)]
fn scenario_exhausted(resolution_context: ResolutionContext) {
    drop(resolution_context);
}
