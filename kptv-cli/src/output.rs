//! Summary blocks printed after each action

use core_sync::{CleanupSummary, MissingReport, RunReport, UnitFailure};
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

fn rule(out: &mut String) {
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
}

fn header(out: &mut String, title: &str) {
    rule(out);
    out.push_str(title);
    out.push('\n');
    rule(out);
}

fn failures(out: &mut String, failures: &[UnitFailure]) {
    for failure in failures {
        let _ = writeln!(out, "Error in {}: {}", failure.unit, failure.message);
    }
}

fn warnings(out: &mut String, warnings: &[UnitFailure]) {
    for warning in warnings {
        let _ = writeln!(out, "Warning in {}: {}", warning.unit, warning.message);
    }
}

pub fn sync_summary(report: &RunReport) -> String {
    let mut out = String::new();
    failures(&mut out, &report.failures);
    warnings(&mut out, &report.warnings);
    header(&mut out, "SYNC COMPLETE");
    let _ = writeln!(out, "Providers processed: {}", report.units);
    let _ = writeln!(out, "Streams synced: {}", report.changed);
    let _ = writeln!(out, "Streams deactivated: {}", report.deactivated);
    let _ = writeln!(out, "Errors: {}", report.failed);
    if report.skipped > 0 {
        let _ = writeln!(out, "Skipped (cancelled): {}", report.skipped);
    }
    rule(&mut out);
    out
}

pub fn missing_summary(report: &MissingReport, list_records: bool) -> String {
    let mut out = String::new();
    for provider in &report.providers {
        let _ = writeln!(
            out,
            "Provider {} - {}: {} missing streams",
            provider.provider_id,
            provider.provider_name,
            provider.missing.len()
        );
        if list_records {
            for record in &provider.missing {
                let state = if record.active { "active" } else { "inactive" };
                let _ = writeln!(
                    out,
                    "  [{}] {} ({}) {}",
                    record.id, record.orig_name, state, record.stream_uri
                );
            }
        }
    }
    failures(&mut out, &report.failures);

    header(&mut out, "MISSING CHECK COMPLETE");
    let checked = report.providers.len() + report.failures.len() + report.skipped;
    let _ = writeln!(out, "Providers checked: {}", checked);
    let _ = writeln!(out, "Missing streams: {}", report.total_missing());
    if report.include_inactive {
        out.push_str("Included inactive streams\n");
    }
    let _ = writeln!(out, "Errors: {}", report.failures.len());
    rule(&mut out);
    out
}

pub fn fixup_summary(report: &RunReport) -> String {
    let mut out = String::new();
    failures(&mut out, &report.failures);
    header(&mut out, "FIXUP COMPLETE");
    let _ = writeln!(out, "Users processed: {}", report.units);
    let _ = writeln!(out, "Records fixed: {}", report.changed);
    let _ = writeln!(out, "Errors: {}", report.failed);
    rule(&mut out);
    out
}

/// Printed before the cleanup procedure starts.
pub fn cleanup_banner() -> &'static str {
    concat!(
        "Running cleanup...\n",
        "  - Removing orphaned streams (provider no longer exists)\n",
        "  - Removing duplicate streams (keeping highest ID per URI)\n",
        "  - Clearing temporary table\n",
    )
}

pub fn cleanup_summary(summary: &CleanupSummary) -> String {
    let mut out = String::new();
    match (&summary.removed, &summary.error) {
        (Some(removed), _) => {
            header(&mut out, "CLEANUP COMPLETE");
            let _ = writeln!(out, "Orphaned streams removed: {}", removed.orphans_removed);
            let _ = writeln!(out, "Duplicate streams removed: {}", removed.duplicates_removed);
            rule(&mut out);
        }
        (None, Some(error)) => {
            let _ = writeln!(out, "Error running cleanup: {}", error);
        }
        (None, None) => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::{CleanupReport, ProviderId, StreamId, StreamRecord, UserId};
    use core_sync::{Action, ProviderMissing, RunId};

    #[test]
    fn test_sync_summary() {
        let mut report = RunReport::new(RunId::new(), Action::Sync);
        report.units = 3;
        report.succeeded = 2;
        report.failed = 1;
        report.changed = 14;
        report.deactivated = 2;
        report.failures.push(UnitFailure {
            unit: "provider 32".to_string(),
            message: "timed out".to_string(),
        });

        let out = sync_summary(&report);
        assert!(out.starts_with("Error in provider 32: timed out\n"));
        assert!(out.contains("SYNC COMPLETE"));
        assert!(out.contains("Providers processed: 3\n"));
        assert!(out.contains("Streams synced: 14\n"));
        assert!(out.contains("Errors: 1\n"));
        assert!(!out.contains("Skipped"));
        assert!(!out.contains("Warning"));
    }

    #[test]
    fn test_sync_summary_lists_warnings() {
        let mut report = RunReport::new(RunId::new(), Action::Sync);
        report.units = 1;
        report.succeeded = 1;
        report.changed = 2;
        report.warnings.push(UnitFailure {
            unit: "provider 7".to_string(),
            message: "database is locked".to_string(),
        });

        let out = sync_summary(&report);
        assert!(out.starts_with("Warning in provider 7: database is locked\n"));
        assert!(out.contains("Streams synced: 2\n"));
        assert!(out.contains("Errors: 0\n"));
    }

    #[test]
    fn test_missing_summary_lists_records_in_debug() {
        let record = StreamRecord::new(StreamId(5), ProviderId(1), UserId(1), "http://h/5.ts", "CNN");
        let report = MissingReport {
            run_id: RunId::new(),
            include_inactive: false,
            providers: vec![ProviderMissing {
                provider_id: ProviderId(1),
                provider_name: "Main".to_string(),
                missing: vec![record],
            }],
            failures: Vec::new(),
            skipped: 0,
        };

        let quiet = missing_summary(&report, false);
        assert!(quiet.contains("Provider 1 - Main: 1 missing streams"));
        assert!(!quiet.contains("http://h/5.ts"));
        assert!(quiet.contains("Missing streams: 1\n"));

        let verbose = missing_summary(&report, true);
        assert!(verbose.contains("  [5] CNN (active) http://h/5.ts"));
    }

    #[test]
    fn test_cleanup_banner_lists_every_step() {
        let lines: Vec<&str> = cleanup_banner().lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Running cleanup...");
        assert_eq!(lines[3], "  - Clearing temporary table");
    }

    #[test]
    fn test_cleanup_summary() {
        let ok = CleanupSummary {
            run_id: RunId::new(),
            removed: Some(CleanupReport {
                orphans_removed: 3,
                duplicates_removed: 1,
            }),
            error: None,
        };
        let out = cleanup_summary(&ok);
        assert!(out.contains("CLEANUP COMPLETE"));
        assert!(out.contains("Orphaned streams removed: 3"));

        let failed = CleanupSummary {
            run_id: RunId::new(),
            removed: None,
            error: Some("database is locked".to_string()),
        };
        assert_eq!(
            cleanup_summary(&failed),
            "Error running cleanup: database is locked\n"
        );
    }
}
