//! The packaging run: resolve, assemble every variant, publish every bundle.
//!
//! Configuration and assembly problems abort the run before anything is
//! published. Publication problems never abort it: every (bundle, target)
//! pair ends with its own terminal [`PublicationResult`].

pub mod publish;
pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use forge_schema::{ContentHash, PackageDescriptor, VariantName};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::assembler::Assembler;
use crate::bundle::{Bundle, BundleId};
use crate::error::PipelineError;
use crate::lookup::ArtifactLookup;
use crate::reporter::Reporter;
use crate::resolver::{MergeablePaths, Resolution, Resolver, ServiceFiles};
use crate::targets::PublicationTarget;

pub use publish::{PublicationReport, PublicationResult, Publisher, publish_to_target};
pub use retry::{Backoff, CANCELLED, InvalidTransition, PublishState, RetryPolicy};

/// Everything one run needs, passed in explicitly.
#[derive(Clone)]
pub struct PublishPlan {
    pub descriptor: PackageDescriptor,
    pub lookup: Arc<dyn ArtifactLookup>,
    pub mergeable: Arc<dyn MergeablePaths>,
    pub assembler: Assembler,
    pub targets: Vec<Arc<dyn PublicationTarget>>,
    pub policy: RetryPolicy,
    pub concurrency: usize,
}

impl std::fmt::Debug for PublishPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets: Vec<&str> = self.targets.iter().map(|t| t.name()).collect();
        f.debug_struct("PublishPlan")
            .field("module", &self.descriptor.module)
            .field("version", &self.descriptor.version)
            .field("targets", &targets)
            .field("policy", &self.policy)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl PublishPlan {
    /// A plan with no targets, the default retry policy and one task per CPU.
    pub fn new(descriptor: PackageDescriptor, lookup: Arc<dyn ArtifactLookup>) -> Self {
        Self {
            descriptor,
            lookup,
            mergeable: Arc::new(ServiceFiles),
            assembler: Assembler::new(),
            targets: Vec::new(),
            policy: RetryPolicy::default(),
            concurrency: num_cpus::get(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<Arc<dyn PublicationTarget>>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_assembler(mut self, assembler: Assembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_mergeable(mut self, mergeable: Arc<dyn MergeablePaths>) -> Self {
        self.mergeable = mergeable;
        self
    }
}

/// Publication results for one bundle.
#[derive(Debug, Clone)]
pub struct BundleReport {
    pub id: BundleId,
    pub variant: VariantName,
    pub digest: ContentHash,
    pub size: u64,
    pub publications: PublicationReport,
}

/// Outcome of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub bundles: Vec<BundleReport>,
    pub elapsed: Duration,
}

impl RunReport {
    /// False when any target failed for any bundle.
    pub fn is_success(&self) -> bool {
        self.bundles.iter().all(|b| b.publications.is_success())
    }

    pub fn succeeded(&self) -> usize {
        self.bundles.iter().map(|b| b.publications.succeeded()).sum()
    }

    pub fn failed(&self) -> usize {
        self.bundles.iter().map(|b| b.publications.failed()).sum()
    }
}

/// Drives runs, reporting progress to `R`.
#[derive(Debug, Clone)]
pub struct Pipeline<R> {
    reporter: R,
    cancel: CancellationToken,
}

impl<R: Reporter + Clone + 'static> Pipeline<R> {
    pub fn new(reporter: R, cancel: CancellationToken) -> Self {
        Self { reporter, cancel }
    }

    /// Resolve every variant of the plan's descriptor on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if resolution fails.
    pub async fn resolve(&self, plan: &PublishPlan) -> Result<Resolution, PipelineError> {
        self.reporter.section("Resolving");
        let descriptor = plan.descriptor.clone();
        let lookup = Arc::clone(&plan.lookup);
        let mergeable = Arc::clone(&plan.mergeable);

        let resolution = tokio::task::spawn_blocking(move || {
            Resolver::new(lookup.as_ref())
                .with_mergeable(mergeable.as_ref())
                .resolve(&descriptor)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;

        for (variant, manifest) in resolution.manifests() {
            self.reporter.resolved(variant, manifest.len());
        }
        Ok(resolution)
    }

    /// Assemble every variant in parallel on the blocking pool.
    ///
    /// Bundles are returned in variant declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError::Assembly`] in variant order; no
    /// bundle is returned if any variant fails.
    pub async fn assemble(
        &self,
        plan: &PublishPlan,
        resolution: &Resolution,
    ) -> Result<Vec<Arc<Bundle>>, PipelineError> {
        self.reporter.section("Assembling");
        let tasks = resolution.manifests().iter().map(|(variant, manifest)| {
            let assembler = plan.assembler.clone();
            let manifest = Arc::clone(manifest);
            let variant = variant.clone();
            let id = resolution.bundle_id(&variant);
            tokio::task::spawn_blocking(move || assembler.assemble(id, &manifest, &variant))
        });

        let mut bundles = Vec::new();
        for joined in join_all(tasks).await {
            let bundle = joined.map_err(|e| PipelineError::Worker(e.to_string()))??;
            self.reporter
                .assembled(bundle.artifact_id(), bundle.variant(), bundle.size());
            bundles.push(Arc::new(bundle));
        }
        Ok(bundles)
    }

    /// Publish every bundle to every target of the plan.
    pub async fn publish(&self, plan: &PublishPlan, bundles: &[Arc<Bundle>]) -> Vec<BundleReport> {
        self.reporter.section("Publishing");
        let publisher = Publisher::new(
            plan.policy,
            plan.concurrency,
            self.cancel.clone(),
            self.reporter.clone(),
        );

        let reports = join_all(
            bundles
                .iter()
                .map(|bundle| publisher.publish(Arc::clone(bundle), &plan.targets)),
        )
        .await;

        bundles
            .iter()
            .zip(reports)
            .map(|(bundle, publications)| BundleReport {
                id: bundle.id().clone(),
                variant: bundle.variant().clone(),
                digest: bundle.digest().clone(),
                size: bundle.size(),
                publications,
            })
            .collect()
    }

    /// Resolve, assemble and publish.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] for configuration or assembly failures,
    /// before anything is published. Publication failures are reported in
    /// the returned [`RunReport`] instead.
    pub async fn run(&self, plan: &PublishPlan) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let resolution = self.resolve(plan).await?;
        let bundles = self.assemble(plan, &resolution).await?;
        let reports = self.publish(plan, &bundles).await;

        let report = RunReport {
            bundles: reports,
            elapsed: started.elapsed(),
        };
        info!(
            module = %plan.descriptor.module,
            bundles = report.bundles.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "run finished"
        );
        self.reporter.summary(
            report.succeeded(),
            report.failed(),
            report.elapsed.as_secs_f64(),
        );
        Ok(report)
    }
}

/// Run `plan` without progress reporting.
///
/// # Errors
///
/// See [`Pipeline::run`].
pub async fn run(plan: &PublishPlan, cancel: CancellationToken) -> Result<RunReport, PipelineError> {
    Pipeline::new(crate::reporter::NullReporter, cancel).run(plan).await
}
