//! Fan-out of one bundle to many targets.

use std::sync::Arc;

use forge_schema::ContentHash;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bundle::Bundle;
use crate::reporter::Reporter;
use crate::targets::{Outcome, PublicationTarget};

use super::retry::{PublishState, RetryPolicy};

/// Terminal result of publishing one bundle to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationResult {
    pub target: String,
    /// Always `Success` or `Fatal`.
    pub outcome: Outcome,
    /// Attempts made; `0` when the target already held the bundle.
    pub attempt: u32,
}

impl PublicationResult {
    fn from_state(target: &str, state: &PublishState) -> Self {
        let outcome = state
            .outcome()
            .unwrap_or_else(|| Outcome::Fatal(format!("publication stopped in {state:?}")));
        Self {
            target: target.to_string(),
            outcome,
            attempt: state.attempt(),
        }
    }

    fn fatal(target: &str, reason: String) -> Self {
        Self {
            target: target.to_string(),
            outcome: Outcome::Fatal(reason),
            attempt: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Results for one bundle, in target declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationReport {
    results: Vec<PublicationResult>,
}

impl PublicationReport {
    pub fn results(&self) -> &[PublicationResult] {
        &self.results
    }

    pub fn get(&self, target: &str) -> Option<&PublicationResult> {
        self.results.iter().find(|r| r.target == target)
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(PublicationResult::is_success)
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Publishes bundles to targets with bounded concurrency.
///
/// Every target runs on its own task. The semaphore is shared by all bundles
/// published through the same `Publisher`.
#[derive(Debug, Clone)]
pub struct Publisher<R> {
    policy: RetryPolicy,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    reporter: R,
}

impl<R: Reporter + Clone + 'static> Publisher<R> {
    pub fn new(policy: RetryPolicy, concurrency: usize, cancel: CancellationToken, reporter: R) -> Self {
        Self {
            policy,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            cancel,
            reporter,
        }
    }

    /// Publish `bundle` to every target and wait for all of them.
    ///
    /// Targets are isolated: a failing or panicking target only affects its
    /// own result.
    pub async fn publish(
        &self,
        bundle: Arc<Bundle>,
        targets: &[Arc<dyn PublicationTarget>],
    ) -> PublicationReport {
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let name = target.name().to_string();
            let target = Arc::clone(target);
            let bundle = Arc::clone(&bundle);
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = self.cancel.clone();
            let reporter = self.reporter.clone();
            let policy = self.policy;

            handles.push((
                name,
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return PublicationResult::fatal(target.name(), "semaphore closed".into());
                    };
                    publish_to_target(target.as_ref(), &bundle, &policy, &cancel, &reporter).await
                }),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(target = %name, error = %e, "target task failed");
                    PublicationResult::fatal(&name, format!("target task failed: {e}"))
                }
            };
            match &result.outcome {
                Outcome::Success => {
                    if result.attempt > 0 {
                        self.reporter
                            .done(&result.target, bundle.artifact_id(), result.attempt);
                    }
                }
                Outcome::Retryable(reason) | Outcome::Fatal(reason) => {
                    self.reporter.failed(&result.target, bundle.artifact_id(), reason);
                }
            }
            results.push(result);
        }

        PublicationReport { results }
    }
}

/// Drive the state machine for one (bundle, target) pair to a terminal state.
pub async fn publish_to_target<R: Reporter>(
    target: &dyn PublicationTarget,
    bundle: &Bundle,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    reporter: &R,
) -> PublicationResult {
    let name = target.name();
    let artifact = bundle.artifact_id();
    let mut state = PublishState::Pending;

    if cancel.is_cancelled() {
        return PublicationResult::from_state(name, &state.cancel());
    }

    if is_current(target, bundle).await {
        info!(target = %name, bundle = %bundle.id(), "target already holds bundle");
        reporter.unchanged(name, artifact);
        state = match state.unchanged() {
            Ok(next) => next,
            Err(e) => return PublicationResult::fatal(name, e.to_string()),
        };
    }

    while !state.is_terminal() {
        if cancel.is_cancelled() {
            warn!(target = %name, bundle = %bundle.id(), "publication cancelled");
            state = state.cancel();
            break;
        }

        state = match state.start() {
            Ok(next) => next,
            Err(e) => return PublicationResult::fatal(name, e.to_string()),
        };
        let attempt = state.attempt();
        reporter.publishing(name, artifact, attempt);
        info!(target = %name, bundle = %bundle.id(), attempt, "publishing");

        let outcome = target.accepts(bundle).await;
        state = match state.complete(outcome, policy) {
            Ok(next) => next,
            Err(e) => return PublicationResult::fatal(name, e.to_string()),
        };

        let backoff = match &state {
            PublishState::Retrying { delay, reason, .. } => {
                warn!(target = %name, attempt, reason = %reason, delay_ms = delay.as_millis() as u64, "retrying");
                reporter.retrying(name, artifact, attempt, *delay, reason);
                Some(*delay)
            }
            PublishState::Failed { reason, .. } => {
                error!(target = %name, attempt, reason = %reason, "publication failed");
                None
            }
            _ => None,
        };

        if let Some(delay) = backoff {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    warn!(target = %name, bundle = %bundle.id(), "publication cancelled");
                    state = state.cancel();
                }
            }
        }
    }

    PublicationResult::from_state(name, &state)
}

async fn is_current(target: &dyn PublicationTarget, bundle: &Bundle) -> bool {
    let current: Option<ContentHash> = target.current_content_hash(bundle.id()).await;
    current.as_ref() == Some(bundle.digest())
}
