//! Shared fixtures for tunnel resolution BDD scenarios.

use edgeboot::{DomainSource, ResolverState};
use rstest::fixture;

/// What one resolution run produced.
#[derive(Clone, Debug)]
pub struct ResolutionOutcome {
    pub hostname: Option<(String, DomainSource)>,
    pub exhausted_after: Option<u32>,
    pub error: Option<String>,
    pub history: Vec<ResolverState>,
    pub relaunches: usize,
}

/// Scenario state. Filesystem and process doubles are created when the
/// resolver runs so the context stays cheap to clone between steps.
#[derive(Clone, Debug)]
pub struct ResolutionContext {
    pub static_domain: Option<String>,
    pub initial_log: Option<String>,
    pub relaunch_logs: Vec<String>,
    pub max_attempts: u32,
    pub outcome: Option<ResolutionOutcome>,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self {
            static_domain: None,
            initial_log: None,
            relaunch_logs: Vec::new(),
            max_attempts: 5,
            outcome: None,
        }
    }
}

#[fixture]
pub fn resolution_context() -> ResolutionContext {
    ResolutionContext::default()
}

/// Log line in the shape the tunnel client prints for a quick tunnel.
pub fn log_line(hostname: &str) -> String {
    format!("2024-05-01T00:00:01Z INF |  https://{hostname}                 |\n")
}
