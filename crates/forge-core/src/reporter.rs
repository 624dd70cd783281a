//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress and status without
//! being coupled to a specific terminal renderer.

use std::time::Duration;

use forge_schema::VariantName;

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Resolving", "Publishing").
    fn section(&self, title: &str);

    /// A variant was resolved into a manifest of `entries` files.
    fn resolved(&self, variant: &VariantName, entries: usize);

    /// A bundle was assembled.
    fn assembled(&self, artifact_id: &str, variant: &VariantName, size: u64);

    /// An attempt to publish `artifact_id` to `target` started.
    fn publishing(&self, target: &str, artifact_id: &str, attempt: u32);

    /// A retryable failure occurred; the next attempt starts after `delay`.
    fn retrying(&self, target: &str, artifact_id: &str, attempt: u32, delay: Duration, reason: &str);

    /// The target already held identical content; nothing was uploaded.
    fn unchanged(&self, target: &str, artifact_id: &str);

    /// Publication to a target completed successfully.
    fn done(&self, target: &str, artifact_id: &str, attempt: u32);

    /// Publication to a target ended in failure.
    fn failed(&self, target: &str, artifact_id: &str, reason: &str);

    /// Display a final summary.
    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title)
    }
    fn resolved(&self, variant: &VariantName, entries: usize) {
        (**self).resolved(variant, entries)
    }
    fn assembled(&self, artifact_id: &str, variant: &VariantName, size: u64) {
        (**self).assembled(artifact_id, variant, size)
    }
    fn publishing(&self, target: &str, artifact_id: &str, attempt: u32) {
        (**self).publishing(target, artifact_id, attempt)
    }
    fn retrying(&self, target: &str, artifact_id: &str, attempt: u32, delay: Duration, reason: &str) {
        (**self).retrying(target, artifact_id, attempt, delay, reason)
    }
    fn unchanged(&self, target: &str, artifact_id: &str) {
        (**self).unchanged(target, artifact_id)
    }
    fn done(&self, target: &str, artifact_id: &str, attempt: u32) {
        (**self).done(target, artifact_id, attempt)
    }
    fn failed(&self, target: &str, artifact_id: &str, reason: &str) {
        (**self).failed(target, artifact_id, reason)
    }
    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64) {
        (**self).summary(succeeded, failed, elapsed_secs)
    }
}

/// A no-op reporter for silent operations (e.g., library use, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn resolved(&self, _: &VariantName, _: usize) {}
    fn assembled(&self, _: &str, _: &VariantName, _: u64) {}
    fn publishing(&self, _: &str, _: &str, _: u32) {}
    fn retrying(&self, _: &str, _: &str, _: u32, _: Duration, _: &str) {}
    fn unchanged(&self, _: &str, _: &str) {}
    fn done(&self, _: &str, _: &str, _: u32) {}
    fn failed(&self, _: &str, _: &str, _: &str) {}
    fn summary(&self, _: usize, _: usize, _: f64) {}
}
