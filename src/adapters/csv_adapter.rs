//! CSV file data adapter.
//!
//! One file per instrument, `<data_dir>/<ID>.csv`, with a header row
//! `time,open,high,low,close,volume` (`date` is accepted for `time`).
//! Timestamps are `YYYY-MM-DD HH:MM:SS` or plain `YYYY-MM-DD` (midnight).

use crate::domain::error::ConfluenceError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date")]
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &InstrumentId) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument))
    }
}

pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        instrument: &InstrumentId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ConfluenceError> {
        let path = self.csv_path(instrument);
        let content = fs::read_to_string(&path).map_err(|e| ConfluenceError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| ConfluenceError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let time = parse_time(&row.time).ok_or_else(|| ConfluenceError::Data {
                reason: format!(
                    "{}: invalid time '{}' on row {}",
                    path.display(),
                    row.time,
                    line + 1
                ),
            })?;

            let date = time.date();
            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                instrument: instrument.clone(),
                time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }

    fn list_instruments(&self) -> Result<Vec<InstrumentId>, ConfluenceError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ConfluenceError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfluenceError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(stem) = name_str.strip_suffix(".csv") {
                ids.push(InstrumentId::new(stem));
            }
        }

        ids.sort();
        Ok(ids)
    }
}
