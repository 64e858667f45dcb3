use std::io::{self, Write};
use std::path::Path;

use alttext_engine::model::{AppliedChange, ApplyFailure, ApplyReport, LineTarget, SkippedEntry};

/// Render an apply report for a human reader. `captions` is the file the
/// resolutions were loaded from.
///
/// Documents appear in the order they were first touched; within a document,
/// applied changes come before failures.
pub fn write_report(out: &mut impl Write, report: &ApplyReport, captions: &Path) -> io::Result<()> {
    write_skipped(out, &report.skipped)?;

    let total = report.applied.len() + report.failures.len();
    if total == 0 {
        writeln!(out, "No captions with 'final_alt' found in {}", captions.display())?;
    } else if report.dry_run {
        writeln!(out, "Found {total} captions to apply (dry run)")?;
    } else {
        writeln!(out, "Found {total} captions to apply")?;
    }

    for document in documents(report) {
        let applied: Vec<&AppliedChange> = report
            .applied
            .iter()
            .filter(|c| c.document_path == document)
            .collect();
        let failed: Vec<&ApplyFailure> = report
            .failures
            .iter()
            .filter(|f| f.document_path == document)
            .collect();

        writeln!(out, "\nProcessing {document} ({} captions)", applied.len() + failed.len())?;
        for change in applied {
            let verb = if report.dry_run { "Would apply" } else { "Applied" };
            let previous = change
                .previous
                .as_deref()
                .map(|p| format!("\"{p}\""))
                .unwrap_or_else(|| "(no alt)".to_string());
            writeln!(
                out,
                "  {verb}: {previous} → \"{}\" @ {}",
                change.new_text,
                location(change.target, change.occurrences)
            )?;
        }
        for failure in failed {
            writeln!(
                out,
                "  Skipped: {} in {}: {}",
                failure.asset_path, failure.document_path, failure.error
            )?;
        }
    }

    let applied = report.applied_count();
    if report.dry_run {
        writeln!(out, "\nDry run complete: {applied} captions would be applied")?;
    } else {
        writeln!(out, "\nSuccessfully applied {applied} captions")?;
    }
    Ok(())
}

fn write_skipped(out: &mut impl Write, skipped: &[SkippedEntry]) -> io::Result<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    let noun = if skipped.len() == 1 { "entry" } else { "entries" };
    writeln!(out, "Note: {} {noun} without 'final_alt' will be skipped:", skipped.len())?;
    for entry in skipped {
        writeln!(out, "  {}: {}", entry.document_path, entry.asset_basename)?;
    }
    writeln!(out)
}

fn location(target: LineTarget, occurrences: usize) -> String {
    match target {
        LineTarget::Targeted(_) => target.to_string(),
        LineTarget::AnyOccurrence => format!("{target} ({occurrences})"),
    }
}

fn documents(report: &ApplyReport) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    let paths = report
        .applied
        .iter()
        .map(|c| c.document_path.as_str())
        .chain(report.failures.iter().map(|f| f.document_path.as_str()));
    for path in paths {
        if !seen.contains(&path) {
            seen.push(path);
        }
    }
    seen
}
