//! Human-readable status lines. All of them go to stderr so a document
//! written to stdout stays clean.

use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    eprintln!("{} {}", Icons::ROCKET, text.style(theme().header));
}

pub fn status(icon: &str, label: &str, value: &str) {
    eprintln!("{} {}: {}", icon, label.style(theme().dim), value);
}

pub fn success(label: &str) {
    eprintln!("{} {}", Icons::CHECK, label.style(theme().success));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn));
}

pub fn info(label: &str, value: &str) {
    eprintln!(
        "{} {}: {}",
        Icons::INFO.style(theme().info),
        label.style(theme().dim),
        value
    );
}

pub fn summary_row(label: &str, value: &str) {
    eprintln!("  {} {}", label.style(theme().dim), value);
}

/// Byte count with a binary unit, e.g. `8.0 MiB`
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
