//! Text rendering of validation results

use super::validator::{AdmissionReport, ScanReport};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Horizontal bar chart of samples per class.
///
/// The longest bar is `width` characters; any non-zero count gets at least one.
pub fn distribution_chart(counts: &BTreeMap<String, usize>, width: usize) -> String {
    let mut out = String::new();
    let max = counts.values().copied().max().unwrap_or(0);
    let label_width = counts.keys().map(|k| k.chars().count()).max().unwrap_or(0);

    for (class, count) in counts {
        let bar = if max == 0 {
            0
        } else {
            ((*count * width) as f64 / max as f64).round().max(if *count > 0 { 1.0 } else { 0.0 }) as usize
        };
        let _ = writeln!(
            out,
            "{:<label_width$} | {:<width$} {}",
            class,
            "#".repeat(bar),
            count,
            label_width = label_width,
            width = width
        );
    }
    out
}

/// Summary block printed by the `validate` command
pub fn render_scan(scan: &ScanReport, admission: &AdmissionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Summary:");
    for (class, count) in &scan.counts {
        let _ = writeln!(out, " - {}: {} samples", class, count);
    }
    let _ = writeln!(out, "\nFound {} corrupt or invalid files.", scan.corrupt.len());
    for corrupt in &scan.corrupt {
        let _ = writeln!(out, " - {} ({})", corrupt.path.display(), corrupt.reason);
    }

    let _ = writeln!(out);
    if admission.is_admitted() {
        let _ = writeln!(
            out,
            "Training admission: OK ({} classes, {} samples)",
            admission.eligible.len(),
            admission.total_valid
        );
    } else if let Some(reason) = &admission.rejection {
        let _ = writeln!(out, "Training admission: REJECTED ({})", reason);
    }
    for (class, count) in &admission.excluded {
        let _ = writeln!(out, " - excluded {}: only {} valid samples", class, count);
    }
    out
}
