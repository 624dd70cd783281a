//! Tables for `forge resolve` and the end-of-run publication summary.

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{Cell, CellAlignment, Color, Table};
use forge_core::Outcome;
use forge_core::pipeline::RunReport;
use forge_schema::ResolvedManifest;

use super::{format_size, short_hash};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY).set_header(header.to_vec());
    table
}

/// One row per manifest entry.
pub fn entries(manifest: &ResolvedManifest) -> Table {
    let mut out = table(&["path", "size", "sha256", "origin"]);
    for entry in manifest.entries() {
        let origins: Vec<String> = entry.sources().iter().map(|s| s.origin.to_string()).collect();
        let hash = entry.hash();
        out.add_row(vec![
            Cell::new(entry.path()),
            Cell::new(format_size(entry.content().len() as u64)).set_alignment(CellAlignment::Right),
            Cell::new(short_hash(hash.as_str())),
            Cell::new(origins.join(", ")),
        ]);
    }
    out
}

/// One row per (bundle, target) pair.
pub fn publications(report: &RunReport) -> Table {
    let mut out = table(&["bundle", "target", "attempts", "result"]);
    for bundle in &report.bundles {
        for result in bundle.publications.results() {
            let (label, color) = match &result.outcome {
                Outcome::Success if result.attempt == 0 => ("unchanged".to_string(), Color::DarkGrey),
                Outcome::Success => ("published".to_string(), Color::Green),
                other => (other.to_string(), Color::Red),
            };
            out.add_row(vec![
                Cell::new(&bundle.id),
                Cell::new(&result.target),
                Cell::new(result.attempt).set_alignment(CellAlignment::Right),
                Cell::new(label).fg(color),
            ]);
        }
    }
    out
}
