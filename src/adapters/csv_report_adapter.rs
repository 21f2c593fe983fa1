//! CSV report adapter.
//!
//! Writes one row per (instrument, signal combination) bucket to the output
//! path, and the per-indicator signal counts to a sibling
//! `<stem>_signals.csv`.

use crate::domain::error::ConfluenceError;
use crate::domain::metrics::RunReport;
use crate::ports::report_port::ReportPort;
use std::io::Write;
use std::path::{Path, PathBuf};

const COMBO_HEADER: [&str; 13] = [
    "instrument",
    "combo",
    "count",
    "wins",
    "win_rate",
    "avg_return",
    "total_pnl",
    "avg_duration_hours",
    "max_return",
    "min_return",
    "std_dev",
    "trailing_stop_exits",
    "trailing_stop_exit_rate",
];

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `report.csv` -> `report_signals.csv`, next to the combo file.
    pub fn signals_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{stem}_signals.csv"))
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn report_err(e: impl std::fmt::Display) -> ConfluenceError {
    ConfluenceError::Report {
        reason: e.to_string(),
    }
}

fn write_combos<W: Write>(report: &RunReport, wtr: &mut csv::Writer<W>) -> Result<(), ConfluenceError> {
    wtr.write_record(COMBO_HEADER).map_err(report_err)?;
    for c in report.combos() {
        wtr.write_record([
            c.instrument.to_string(),
            c.combo.clone(),
            c.count.to_string(),
            c.wins.to_string(),
            format!("{:.2}", c.win_rate),
            format!("{:.4}", c.avg_return),
            format!("{:.2}", c.total_pnl),
            format!("{:.2}", c.avg_duration_hours),
            format!("{:.4}", c.max_return),
            format!("{:.4}", c.min_return),
            format!("{:.4}", c.std_dev),
            c.trailing_stop_exits.to_string(),
            format!("{:.2}", c.trailing_stop_exit_rate),
        ])
        .map_err(report_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Combo rows as a CSV string, for printing to stdout.
pub fn render_combos(report: &RunReport) -> Result<String, ConfluenceError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    write_combos(report, &mut wtr)?;
    let data = wtr.into_inner().map_err(report_err)?;
    String::from_utf8(data).map_err(report_err)
}

fn write_signal_counts(report: &RunReport, path: &Path) -> Result<(), ConfluenceError> {
    let mut wtr = csv::Writer::from_path(path).map_err(report_err)?;
    wtr.write_record(["instrument", "indicator", "buy", "sell"])
        .map_err(report_err)?;
    for instrument in &report.instruments {
        for (indicator, counts) in &instrument.signal_counts {
            wtr.write_record([
                instrument.instrument.to_string(),
                indicator.clone(),
                counts.buy.to_string(),
                counts.sell.to_string(),
            ])
            .map_err(report_err)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &RunReport, output_path: &Path) -> Result<(), ConfluenceError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(report_err)?;
        write_combos(report, &mut wtr)?;
        write_signal_counts(report, &Self::signals_path(output_path))
    }
}
