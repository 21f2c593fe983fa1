//! JSON report adapter: the whole `RunReport` as pretty-printed JSON.

use crate::domain::error::ConfluenceError;
use crate::domain::metrics::RunReport;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;

#[derive(Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

pub fn render_json(report: &RunReport) -> Result<String, ConfluenceError> {
    serde_json::to_string_pretty(report).map_err(|e| ConfluenceError::Report {
        reason: format!("failed to serialize report: {e}"),
    })
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &RunReport, output_path: &Path) -> Result<(), ConfluenceError> {
        let json = render_json(report)?;
        fs::write(output_path, json).map_err(|e| ConfluenceError::Report {
            reason: format!("failed to write {}: {}", output_path.display(), e),
        })
    }
}
