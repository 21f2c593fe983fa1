//! Report output port.

use crate::domain::error::ConfluenceError;
use crate::domain::metrics::RunReport;
use std::path::Path;

pub trait ReportPort {
    fn write(&self, report: &RunReport, output_path: &Path) -> Result<(), ConfluenceError>;
}
