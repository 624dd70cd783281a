//! Terminal output: progress lines, tables and colors.

pub mod reporter;
pub mod table;

pub use reporter::ConsoleReporter;

use crossterm::style::{Color, Stylize};

pub const ACCENT: Color = Color::Cyan;
pub const SECONDARY: Color = Color::DarkGrey;
pub const SUCCESS: Color = Color::Green;
pub const WARNING: Color = Color::Yellow;
pub const FAILURE: Color = Color::Red;

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}

/// First twelve characters of a digest.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// Print an error to stderr.
pub fn error(msg: &str) {
    eprintln!("{} {msg}", "error:".with(FAILURE).bold());
}
