//! Loaded bars per instrument and the unified timeline across instruments.

use crate::domain::error::ConfluenceError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub instrument: InstrumentId,
    pub bars: Vec<OhlcvBar>,
    pub time_index: HashMap<NaiveDateTime, usize>,
}

impl InstrumentData {
    pub fn new(instrument: InstrumentId, bars: Vec<OhlcvBar>) -> Self {
        let time_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.time, i))
            .collect();
        Self {
            instrument,
            bars,
            time_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, time: NaiveDateTime) -> Option<&OhlcvBar> {
        self.time_index.get(&time).map(|&i| &self.bars[i])
    }
}

/// Every distinct bar time across `data`, ascending.
pub fn build_unified_timeline(data: &[InstrumentData]) -> Vec<NaiveDateTime> {
    let unique: BTreeSet<NaiveDateTime> = data
        .iter()
        .flat_map(|d| d.bars.iter().map(|bar| bar.time))
        .collect();
    unique.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub instrument: InstrumentId,
    pub reason: SkipReason,
}

pub struct LoadedData {
    pub data: Vec<InstrumentData>,
    pub skipped: Vec<SkippedInstrument>,
}

/// Load bars for every instrument, skipping those with no data or fewer
/// than `minimum_bars`. Fails only when nothing is left.
pub fn load_instruments(
    data_port: &dyn DataPort,
    instruments: &[InstrumentId],
    start_date: NaiveDate,
    end_date: NaiveDate,
    minimum_bars: usize,
) -> Result<LoadedData, ConfluenceError> {
    let mut data = Vec::new();
    let mut skipped = Vec::new();

    for id in instruments {
        let bars = match data_port.fetch_ohlcv(id, start_date, end_date) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(instrument = %id, error = %e, "skipping instrument");
                skipped.push(SkippedInstrument {
                    instrument: id.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if bars.is_empty() {
            warn!(instrument = %id, "skipping instrument: no data in range");
            skipped.push(SkippedInstrument {
                instrument: id.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        if bars.len() < minimum_bars {
            warn!(
                instrument = %id,
                bars = bars.len(),
                minimum = minimum_bars,
                "skipping instrument: insufficient bars"
            );
            skipped.push(SkippedInstrument {
                instrument: id.clone(),
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        info!(instrument = %id, bars = bars.len(), "loaded");
        data.push(InstrumentData::new(id.clone(), bars));
    }

    if data.is_empty() {
        return Err(match instruments {
            [only] => match skipped.first().map(|s| &s.reason) {
                Some(SkipReason::InsufficientBars { bars }) => ConfluenceError::InsufficientData {
                    instrument: only.to_string(),
                    bars: *bars,
                    minimum: minimum_bars,
                },
                _ => ConfluenceError::NoData {
                    instrument: only.to_string(),
                },
            },
            _ => ConfluenceError::NoData {
                instrument: "all".to_string(),
            },
        });
    }

    if !skipped.is_empty() {
        info!(
            running = data.len(),
            configured = instruments.len(),
            "some instruments were skipped"
        );
    }

    Ok(LoadedData { data, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_bar(id: &str, date: &str, close: f64) -> OhlcvBar {
        OhlcvBar {
            instrument: InstrumentId::new(id),
            time: at(date),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000.0,
        }
    }

    struct FixedData {
        bars: HashMap<InstrumentId, Vec<OhlcvBar>>,
    }

    impl DataPort for FixedData {
        fn fetch_ohlcv(
            &self,
            instrument: &InstrumentId,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, ConfluenceError> {
            self.bars
                .get(instrument)
                .cloned()
                .ok_or_else(|| ConfluenceError::Data {
                    reason: "missing".into(),
                })
        }

        fn list_instruments(&self) -> Result<Vec<InstrumentId>, ConfluenceError> {
            Ok(self.bars.keys().cloned().collect())
        }
    }

    fn range() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    #[test]
    fn new_builds_time_index() {
        let data = InstrumentData::new(
            InstrumentId::new("BHP"),
            vec![
                make_bar("BHP", "2024-01-01", 100.0),
                make_bar("BHP", "2024-01-02", 101.0),
            ],
        );
        assert_eq!(data.bar_count(), 2);
        assert!((data.get_bar(at("2024-01-02")).unwrap().close - 101.0).abs() < f64::EPSILON);
        assert!(data.get_bar(at("2024-01-05")).is_none());
    }

    #[test]
    fn unified_timeline_merges_and_sorts() {
        let bhp = InstrumentData::new(
            InstrumentId::new("BHP"),
            vec![
                make_bar("BHP", "2024-01-02", 100.0),
                make_bar("BHP", "2024-01-05", 101.0),
            ],
        );
        let rio = InstrumentData::new(
            InstrumentId::new("RIO"),
            vec![
                make_bar("RIO", "2024-01-01", 50.0),
                make_bar("RIO", "2024-01-02", 51.0),
            ],
        );
        let timeline = build_unified_timeline(&[bhp, rio]);
        assert_eq!(
            timeline,
            vec![at("2024-01-01"), at("2024-01-02"), at("2024-01-05")]
        );
    }

    #[test]
    fn unified_timeline_empty() {
        assert!(build_unified_timeline(&[]).is_empty());
    }

    #[test]
    fn load_skips_missing_and_short() {
        let mut bars = HashMap::new();
        bars.insert(
            InstrumentId::new("AAA"),
            vec![
                make_bar("AAA", "2024-01-01", 1.0),
                make_bar("AAA", "2024-01-02", 1.0),
                make_bar("AAA", "2024-01-03", 1.0),
            ],
        );
        bars.insert(InstrumentId::new("BBB"), vec![make_bar("BBB", "2024-01-01", 1.0)]);
        let port = FixedData { bars };
        let ids = [
            InstrumentId::new("AAA"),
            InstrumentId::new("BBB"),
            InstrumentId::new("CCC"),
        ];
        let (start, end) = range();
        let loaded = load_instruments(&port, &ids, start, end, 2).unwrap();

        assert_eq!(loaded.data.len(), 1);
        assert_eq!(loaded.data[0].instrument, InstrumentId::new("AAA"));
        assert_eq!(
            loaded.skipped,
            vec![
                SkippedInstrument {
                    instrument: InstrumentId::new("BBB"),
                    reason: SkipReason::InsufficientBars { bars: 1 },
                },
                SkippedInstrument {
                    instrument: InstrumentId::new("CCC"),
                    reason: SkipReason::NoData,
                },
            ]
        );
    }

    #[test]
    fn single_short_instrument_is_insufficient_data() {
        let mut bars = HashMap::new();
        bars.insert(InstrumentId::new("AAA"), vec![make_bar("AAA", "2024-01-01", 1.0)]);
        let port = FixedData { bars };
        let (start, end) = range();
        let err = load_instruments(&port, &[InstrumentId::new("AAA")], start, end, 5)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfluenceError::InsufficientData { bars: 1, minimum: 5, .. }
        ));
    }

    #[test]
    fn nothing_loaded_is_no_data() {
        let port = FixedData {
            bars: HashMap::new(),
        };
        let (start, end) = range();
        let ids = [InstrumentId::new("AAA"), InstrumentId::new("BBB")];
        let err = load_instruments(&port, &ids, start, end, 1).err().unwrap();
        assert!(matches!(err, ConfluenceError::NoData { .. }));
    }
}
