use super::common::*;

use crate::assignment::domain::Priority;
use crate::assignment::engine::FailureKind;
use crate::assignment::host::{Site, WorkHost};
use crate::assignment::roster::InMemoryWorker;
use crate::assignment::supervisor::{ReassignStatus, DEFAULT_MAX_ATTEMPTS};

#[test]
fn clean_first_pass_settles_in_one_attempt() {
    let host = tied_cooks();
    let outcome = supervisor().reassign(&host, &settings(&[("cooking", 2, 3)]));

    assert_eq!(outcome.status, ReassignStatus::Settled);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.finished_at >= outcome.started_at);
}

#[test]
fn transient_failures_settle_after_retries() {
    let host = tied_cooks();
    assert!(host.fail_next_mutations(&id("b"), 3));

    let outcome = supervisor().reassign(&host, &settings(&[("cooking", 2, 3)]));

    assert!(outcome.is_settled());
    assert_eq!(outcome.attempts, 4);
    assert!(outcome.last_pass.failures.is_empty());
    assert_eq!(assigned(&host, "cooking").get(&id("b")), Some(&Priority(3)));
}

#[test]
fn persistent_failure_gives_up_after_exactly_the_bound() {
    let host = RecordingHost::default()
        .with_worker("base", "stuck", &[("mining", 3.0)], true)
        .with_worker("base", "w-2", &[("mining", 1.0)], false);

    let outcome = supervisor().reassign(&host, &settings(&[("mining", 1, 1)]));

    assert_eq!(outcome.status, ReassignStatus::GaveUp);
    assert_eq!(outcome.attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(host.passes(), 100);
    assert_eq!(outcome.last_pass.failures.len(), 1);
    assert_eq!(outcome.last_pass.failures[0].kind, FailureKind::Mutation);
    assert_eq!(outcome.last_pass.failures[0].worker, id("stuck"));
}

#[test]
fn custom_bound_is_respected_and_floored_at_one() {
    let host = RecordingHost::default().with_worker("base", "stuck", &[("mining", 3.0)], true);
    let settings = settings(&[("mining", 1, 1)]);

    let outcome = supervisor().with_max_attempts(3).reassign(&host, &settings);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(host.passes(), 3);

    let floored = supervisor().with_max_attempts(0);
    assert_eq!(floored.max_attempts(), 1);
}

#[test]
fn worker_removed_mid_invocation_settles_on_next_pass() {
    let host = tied_cooks();
    let stale = host.sites();
    host.remove_worker(&id("b")).expect("worker removed");

    let first = supervisor()
        .engine()
        .run_pass(&StaleHost(stale), &settings(&[("cooking", 2, 3)]));
    assert!(!first.is_clean());

    let outcome = supervisor().reassign(&host, &settings(&[("cooking", 2, 3)]));
    assert!(outcome.is_settled());
    let assigned = assigned(&host, "cooking");
    assert_eq!(assigned.keys().cloned().collect::<Vec<_>>(), ids(&["a", "c"]));
}

/// Replays site handles captured before the roster changed.
struct StaleHost(Vec<Site<InMemoryWorker>>);

impl WorkHost for StaleHost {
    type Worker = InMemoryWorker;

    fn sites(&self) -> Vec<Site<InMemoryWorker>> {
        self.0
            .iter()
            .map(|site| Site::new(site.id.clone(), site.workers.clone()))
            .collect()
    }
}
