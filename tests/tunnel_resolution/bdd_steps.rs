//! BDD step definitions for tunnel hostname resolution.

use std::time::Duration;

use camino::Utf8PathBuf;
use edgeboot::test_support::{ChildScript, ScriptedSpawner};
use edgeboot::workdir::files;
use edgeboot::{
    BinaryRole, DomainSource, LaunchSpec, ProcessSupervisor, Readiness, ResolveError,
    ResolverPolicy, ResolverState, TunnelDomainResolver, WorkDir,
};
use rstest_bdd_macros::{given, then, when};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{ResolutionContext, ResolutionOutcome, log_line};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a configured tunnel domain \"{domain}\"")]
fn configured_domain(mut resolution_context: ResolutionContext, domain: String) -> ResolutionContext {
    resolution_context.static_domain = Some(domain);
    resolution_context
}

#[given("the tunnel log already names \"{hostname}\"")]
fn log_names_hostname(
    mut resolution_context: ResolutionContext,
    hostname: String,
) -> ResolutionContext {
    resolution_context.initial_log = Some(log_line(&hostname));
    resolution_context
}

#[given("the tunnel log names no hostname")]
fn log_is_silent(mut resolution_context: ResolutionContext) -> ResolutionContext {
    resolution_context.initial_log = Some(String::from("INF Starting tunnel\n"));
    resolution_context
}

#[given("the relaunched client logs \"{hostname}\"")]
fn relaunch_logs(mut resolution_context: ResolutionContext, hostname: String) -> ResolutionContext {
    resolution_context.relaunch_logs.push(log_line(&hostname));
    resolution_context
}

#[given("an attempt budget of {attempts}")]
fn attempt_budget(mut resolution_context: ResolutionContext, attempts: u32) -> ResolutionContext {
    resolution_context.max_attempts = attempts;
    resolution_context
}

#[when("the tunnel hostname is resolved")]
fn resolve_hostname(
    mut resolution_context: ResolutionContext,
) -> Result<ResolutionContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let temp = TempDir::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
        .map_err(|path| StepError::Assertion(format!("non-utf8 path: {}", path.display())))?;
    let workdir = WorkDir::open(&root).map_err(|err| StepError::Assertion(err.to_string()))?;
    if let Some(log) = &resolution_context.initial_log {
        workdir
            .write(files::TUNNEL_LOG, log)
            .map_err(|err| StepError::Assertion(err.to_string()))?;
    }

    let spawner = ScriptedSpawner::new();
    for log in &resolution_context.relaunch_logs {
        spawner.push(
            BinaryRole::TunnelClient,
            ChildScript::running().writes(workdir.join(files::TUNNEL_LOG), log.clone()),
        );
    }
    let mut supervisor = ProcessSupervisor::new(spawner.clone());
    let relaunch = LaunchSpec {
        role: BinaryRole::TunnelClient,
        program: workdir.join("bot"),
        args: vec![String::from("tunnel")],
        readiness: Readiness::Settle(Duration::ZERO),
    };
    let policy = ResolverPolicy {
        max_attempts: resolution_context.max_attempts,
        scan_window: Duration::ZERO,
        scan_interval: Duration::from_millis(1),
        terminate_cooldown: Duration::ZERO,
        relaunch_cooldown: Duration::ZERO,
    };
    let mut resolver = TunnelDomainResolver::new(
        resolution_context.static_domain.as_deref(),
        Some(relaunch),
        policy,
    );

    let result = runtime.block_on(resolver.resolve(
        &mut supervisor,
        &workdir,
        &CancellationToken::new(),
    ));
    let (hostname, exhausted_after, error) = match result {
        Ok(tunnel) => (
            Some((tunnel.hostname().to_owned(), tunnel.source())),
            None,
            None,
        ),
        Err(ResolveError::Exhausted { attempts }) => (None, Some(attempts), None),
        Err(err) => (None, None, Some(err.to_string())),
    };
    resolution_context.outcome = Some(ResolutionOutcome {
        hostname,
        exhausted_after,
        error,
        history: resolver.history().to_vec(),
        relaunches: spawner.launch_count(BinaryRole::TunnelClient),
    });
    Ok(resolution_context)
}

fn outcome(resolution_context: &ResolutionContext) -> Result<&ResolutionOutcome, StepError> {
    resolution_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

#[then("the hostname is \"{expected}\"")]
fn hostname_is(resolution_context: &ResolutionContext, expected: String) -> Result<(), StepError> {
    let result = outcome(resolution_context)?;
    match &result.hostname {
        Some((hostname, _)) if *hostname == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected hostname {expected}, got {other:?} (error: {:?})",
            result.error
        ))),
    }
}

#[then("the hostname source is \"{source}\"")]
fn hostname_source(resolution_context: &ResolutionContext, source: String) -> Result<(), StepError> {
    let expected = match source.as_str() {
        "static" => DomainSource::Static,
        "log" => DomainSource::LogScraped,
        other => {
            return Err(StepError::Assertion(format!("unknown source {other}")));
        }
    };
    match &outcome(resolution_context)?.hostname {
        Some((_, actual)) if *actual == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected source {expected:?}, got {other:?}"
        ))),
    }
}

#[then("the tunnel client was relaunched {count} times")]
fn relaunch_count(resolution_context: &ResolutionContext, count: usize) -> Result<(), StepError> {
    let actual = outcome(resolution_context)?.relaunches;
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} relaunches, got {actual}"
        )))
    }
}

#[then("the resolver passed through a retry")]
fn passed_through_retry(resolution_context: &ResolutionContext) -> Result<(), StepError> {
    let history = &outcome(resolution_context)?.history;
    if history
        .iter()
        .any(|state| matches!(state, ResolverState::Retrying { .. }))
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a retry in {history:?}"
        )))
    }
}

#[then("resolution is exhausted after {attempts} attempts")]
fn exhausted_after(resolution_context: &ResolutionContext, attempts: u32) -> Result<(), StepError> {
    let result = outcome(resolution_context)?;
    if result.exhausted_after == Some(attempts)
        && result.history.last() == Some(&ResolverState::Exhausted)
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exhaustion after {attempts} attempts, got {:?}",
            result.exhausted_after
        )))
    }
}
