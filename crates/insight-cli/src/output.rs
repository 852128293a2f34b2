//! Panel output on stdout.

use anyhow::{Context, Result};
use insight::{Figure, Insight, InsightBody};
use std::io::Write;
use std::path::Path;

/// Writes one titled panel section.
pub(crate) fn write_panel(out: &mut impl Write, panel: &Insight) -> std::io::Result<()> {
    let title = panel.title();
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(title.chars().count()))?;
    match &panel.body {
        InsightBody::Text(text) => writeln!(out, "{}", text.trim())?,
        InsightBody::Figure(figure) => write!(out, "{}", figure.to_text())?,
    }
    out.flush()
}

/// Writes the figure as an SVG document.
pub(crate) fn save_svg(figure: &Figure, path: &Path) -> Result<()> {
    std::fs::write(path, figure.to_svg())
        .with_context(|| format!("Failed to write chart to {}", path.display()))
}
