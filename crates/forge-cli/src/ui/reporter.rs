//! Console implementation of the pipeline's progress sink.

use std::time::Duration;

use crossterm::style::Stylize;
use forge_core::Reporter;
use forge_schema::VariantName;

use super::{ACCENT, FAILURE, SECONDARY, SUCCESS, WARNING, format_size};

/// Writes progress to stderr so stdout stays machine-readable.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn line(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{msg}");
        }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        self.line(&title.bold().to_string());
    }

    fn resolved(&self, variant: &VariantName, entries: usize) {
        self.line(&format!(
            "  {} {}",
            format!("{:<16}", variant.as_str()).with(ACCENT),
            format!("{entries} entries").with(SECONDARY)
        ));
    }

    fn assembled(&self, artifact_id: &str, _variant: &VariantName, size: u64) {
        self.line(&format!(
            "  {} {}",
            format!("{artifact_id:<24}").with(ACCENT),
            format_size(size).with(SECONDARY)
        ));
    }

    fn publishing(&self, target: &str, artifact_id: &str, attempt: u32) {
        if attempt > 1 {
            self.line(&format!(
                "  {artifact_id} -> {target} {}",
                format!("attempt {attempt}").with(SECONDARY)
            ));
        }
    }

    fn retrying(&self, target: &str, artifact_id: &str, attempt: u32, delay: Duration, reason: &str) {
        eprintln!(
            "  {} {artifact_id} -> {target} attempt {attempt} failed: {reason} (retrying in {}ms)",
            "retry".with(WARNING),
            delay.as_millis()
        );
    }

    fn unchanged(&self, target: &str, artifact_id: &str) {
        self.line(&format!(
            "  {} {artifact_id} -> {target}",
            "unchanged".with(SECONDARY)
        ));
    }

    fn done(&self, target: &str, artifact_id: &str, _attempt: u32) {
        self.line(&format!("  {} {artifact_id} -> {target}", "done".with(SUCCESS)));
    }

    fn failed(&self, target: &str, artifact_id: &str, reason: &str) {
        eprintln!(
            "  {} {artifact_id} -> {target}: {reason}",
            "failed".with(FAILURE)
        );
    }

    fn summary(&self, succeeded: usize, failed: usize, elapsed_secs: f64) {
        if failed == 0 {
            self.line(&format!(
                "{} {succeeded} publications in {elapsed_secs:.1}s",
                "ok".with(SUCCESS)
            ));
        } else {
            eprintln!(
                "{} {failed} of {} publications failed ({elapsed_secs:.1}s)",
                "failed".with(FAILURE),
                succeeded + failed
            );
        }
    }
}
