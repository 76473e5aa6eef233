//! Human-readable run summaries on stdout.

use ld_migrate_core::report::{EntityCounts, ReviewEntry};
use ld_migrate_core::{CaptureSummary, MigrationReport};
use owo_colors::OwoColorize;

/// Colors only when stdout can show them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Palette {
    color: bool,
}

impl Palette {
    pub(crate) fn stdout() -> Self {
        Self {
            color: supports_color::on(supports_color::Stream::Stdout).is_some(),
        }
    }

    fn good(self, text: &str) -> String {
        if self.color { text.green().to_string() } else { text.to_string() }
    }

    fn warn(self, text: &str) -> String {
        if self.color { text.yellow().to_string() } else { text.to_string() }
    }

    fn bad(self, text: &str) -> String {
        if self.color { text.red().to_string() } else { text.to_string() }
    }

    fn dim(self, text: &str) -> String {
        if self.color { text.dimmed().to_string() } else { text.to_string() }
    }
}

pub(crate) fn print_report(report: &MigrationReport, palette: Palette) {
    println!(
        "\n Migration {} → {}\n",
        report.source_project, report.destination_project
    );
    println!("   environments: {}", report.environments.join(", "));
    print_counts("segments", &report.stats.segments);
    print_counts("flags", &report.stats.flags);
    print_counts("metrics", &report.stats.metrics);

    if !report.skipped.is_empty() {
        println!("\n {}", palette.warn("Skipped"));
        for notice in &report.skipped {
            let scope = notice
                .environment
                .as_deref()
                .map(|env| format!(" [{env}]"))
                .unwrap_or_default();
            println!("   {} {}{}: {}", notice.kind, notice.key, scope, notice.reason);
        }
    }

    println!();
    if report.cancelled {
        println!(
            "{}",
            palette.bad(&format!("Cancelled during {}.", report.phase.as_str()))
        );
    }
    if report.review.is_empty() {
        if !report.cancelled {
            println!("{}", palette.good("Every entity migrated cleanly."));
        }
        return;
    }

    println!(
        "{}",
        palette.warn(&format!(
            "{} entities need manual review:",
            report.review.len()
        ))
    );
    for entry in report.review.entries() {
        println!("   {}", review_line(entry, palette));
    }
}

fn print_counts(label: &str, counts: &EntityCounts) {
    println!(
        "   {label:<9} created {:>4}  patched {:>4}  rejected {:>4}  skipped {:>4}",
        counts.created, counts.patched, counts.rejected, counts.skipped
    );
}

fn review_line(entry: &ReviewEntry, palette: Palette) -> String {
    let scope = entry
        .environment
        .as_deref()
        .map(|env| format!(" [{env}]"))
        .unwrap_or_default();
    format!(
        "{} {}{} {}",
        entry.kind,
        palette.bad(&entry.key),
        scope,
        palette.dim(&format!("({})", entry.reason))
    )
}

pub(crate) fn print_capture(summary: &CaptureSummary, palette: Palette) {
    println!("\n Snapshot of {}\n", summary.project);
    for path in &summary.written {
        println!("   {}", path.display());
    }
    println!();
    if summary.is_complete() {
        println!("{}", palette.good("Captured every resource."));
        return;
    }
    println!(
        "{}",
        palette.warn(&format!("{} resources were not captured:", summary.failures.len()))
    );
    for failure in &summary.failures {
        println!("   {} {}", palette.bad(&failure.resource), palette.dim(&failure.reason));
    }
}
