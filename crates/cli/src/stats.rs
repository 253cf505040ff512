//! Summary output for transition reports

use crate::error::{CommandError, Result};
use hookwarden_engine::TransitionReport;
use owo_colors::OwoColorize;

/// Print a one-line summary of a report, plus a dimmed breakdown
pub fn print_summary(report: &TransitionReport) {
    let changed = report.created + report.deleted;

    if report.failed > 0 {
        println!(
            "{} {} | {} {}",
            "●".bright_green(),
            changed.to_string().bright_green().bold(),
            "●".bright_red(),
            report.failed.to_string().bright_red().bold(),
        );
    } else if changed == 0 {
        println!("{} nothing to change", "●".bright_white());
    } else {
        println!(
            "{} {} changed",
            "●".bright_green(),
            changed.to_string().bright_green().bold()
        );
    }

    let mut parts = Vec::new();
    if report.created > 0 {
        parts.push(format!("{} created", report.created));
    }
    if report.deleted > 0 {
        parts.push(format!("{} deleted", report.deleted));
    }
    if report.unchanged > 0 {
        parts.push(format!("{} unchanged", report.unchanged));
    }
    if !parts.is_empty() {
        println!("  {}", parts.join(", ").dimmed());
    }
}

/// Print a report as JSON or as a summary
pub fn print_report(report: &TransitionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_summary(report);
    }
    Ok(())
}

/// Turn failed units into a non-zero exit
pub fn ensure_success(report: &TransitionReport) -> Result<()> {
    if report.is_success() {
        Ok(())
    } else {
        Err(CommandError::TransitionFailed {
            failed: report.failed,
            total: report.units,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_ensure_success() {
        let mut report = TransitionReport {
            units: 4,
            created: 3,
            ..TransitionReport::default()
        };
        assert!(ensure_success(&report).is_ok());

        report.failed = 1;
        match ensure_success(&report) {
            Err(CommandError::TransitionFailed { failed, total }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
