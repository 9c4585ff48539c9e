//! Run summary rendering.
//!
//! One `tabled` row per device plus a colored footer with the counts.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use nsodiff_core::{DeviceReport, DeviceStatus, Mode, RunSummary};

use crate::cli::ColorMode;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Changes")]
    changes: String,
    #[tabled(rename = "Report")]
    report: String,
}

impl SummaryRow {
    fn new(report: &DeviceReport, mode: Mode, color: bool) -> Self {
        let status = report.status.to_string();
        let status = match (color, report.status) {
            (false, _) => status,
            (true, DeviceStatus::Captured) => status.green().to_string(),
            (true, DeviceStatus::Unreachable) => status.red().to_string(),
            (true, DeviceStatus::Unsynced) => status.yellow().to_string(),
        };

        let changes = match report.diff {
            Some(ref diff) if diff.stats.is_clean() => "none".to_owned(),
            Some(ref diff) => format!(
                "+{} -{} ~{}",
                diff.stats.added, diff.stats.removed, diff.stats.changed
            ),
            None => report.error.clone().unwrap_or_else(|| "-".to_owned()),
        };

        let artifact = match mode {
            Mode::LiveOnly => report.live_capture.as_ref(),
            Mode::ControllerOnly => report.controller_capture.as_ref(),
            Mode::Reconcile => report.diff.as_ref().map(|d| &d.path),
        };

        Self {
            device: report.hostname.clone(),
            status,
            changes,
            report: artifact.map_or_else(|| "-".to_owned(), |p| p.display().to_string()),
        }
    }
}

/// Render the summary table and footer.
pub fn render_summary(summary: &RunSummary, color: bool) -> String {
    let rows: Vec<SummaryRow> = summary
        .devices
        .iter()
        .map(|d| SummaryRow::new(d, summary.mode, color))
        .collect();

    let mut out = Table::new(rows).with(Style::rounded()).to_string();

    let footer = format!(
        "{} captured, {} unsynced, {} unreachable",
        summary.count(DeviceStatus::Captured),
        summary.count(DeviceStatus::Unsynced),
        summary.count(DeviceStatus::Unreachable),
    );
    out.push('\n');
    if color {
        out.push_str(&footer.bold().to_string());
    } else {
        out.push_str(&footer);
    }

    if let Some(ref group) = summary.group {
        out.push_str(&format!("\nstaging group: {group}"));
    }
    if !summary.unknown.is_empty() {
        let line = format!("not in inventory: {}", summary.unknown.join(", "));
        out.push('\n');
        if color {
            out.push_str(&line.dimmed().to_string());
        } else {
            out.push_str(&line);
        }
    }
    out
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use nsodiff_core::{DiffReport, DiffStats};

    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            mode: Mode::Reconcile,
            group: Some("1a2b3c4d".into()),
            devices: vec![
                DeviceReport {
                    hostname: "pe1".into(),
                    status: DeviceStatus::Captured,
                    live_capture: None,
                    controller_capture: None,
                    diff: Some(DiffReport {
                        path: PathBuf::from("reports/DIFF_pe1.html"),
                        stats: DiffStats {
                            added: 2,
                            removed: 0,
                            changed: 1,
                        },
                    }),
                    error: None,
                },
                DeviceReport {
                    hostname: "pe2".into(),
                    status: DeviceStatus::Unsynced,
                    live_capture: None,
                    controller_capture: None,
                    diff: None,
                    error: None,
                },
            ],
            unknown: vec!["ghost".into()],
        }
    }

    #[test]
    fn plain_summary_lists_devices_and_counts() {
        let out = render_summary(&summary(), false);

        assert!(out.contains("reports/DIFF_pe1.html"));
        assert!(out.contains("+2 -0 ~1"));
        assert!(out.contains("unsynced"));
        assert!(out.contains("1 captured, 1 unsynced, 0 unreachable"));
        assert!(out.contains("staging group: 1a2b3c4d"));
        assert!(out.contains("not in inventory: ghost"));
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn colored_summary_emits_escapes() {
        assert!(render_summary(&summary(), true).contains('\u{1b}'));
    }
}
