//! CSV bar file adapter.
//!
//! Expects a header row naming `timestamp,open,high,low,close` and optionally
//! `volume`, in any column order. Prices are parsed straight from text into
//! the run's numeric type.

use crate::domain::bar::Bar;
use crate::domain::error::BacktestError;
use crate::domain::num::{Num, Precision};
use crate::domain::series::BarSeries;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub struct CsvAdapter {
    path: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, BacktestError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| BacktestError::Data {
                reason: format!("missing {} column", name),
            })
        };

        Ok(Self {
            timestamp: require("timestamp")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

impl CsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    text.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
}

fn parse_field<N: Num>(
    record: &csv::StringRecord,
    column: usize,
    name: &str,
    line: u64,
) -> Result<N, BacktestError> {
    let text = record.get(column).ok_or_else(|| BacktestError::Data {
        reason: format!("line {}: missing {} value", line, name),
    })?;
    N::parse(text.trim()).ok_or_else(|| BacktestError::Data {
        reason: format!("line {}: invalid {} value '{}'", line, name, text),
    })
}

impl<N: Num> DataPort<N> for CsvAdapter {
    fn fetch_series(
        &self,
        name: &str,
        precision: Precision,
    ) -> Result<BarSeries<N>, BacktestError> {
        let content = fs::read_to_string(&self.path).map_err(|e| BacktestError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let header = rdr.headers().map_err(|e| BacktestError::Data {
            reason: format!("CSV header error: {}", e),
        })?;
        let columns = Columns::from_header(header)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| BacktestError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let ts_text = record.get(columns.timestamp).unwrap_or_default();
            let timestamp = parse_timestamp(ts_text).ok_or_else(|| BacktestError::Data {
                reason: format!("line {}: invalid timestamp '{}'", line, ts_text),
            })?;

            let volume = match columns.volume {
                Some(column) => parse_field(&record, column, "volume", line)?,
                None => N::zero(),
            };

            bars.push(Bar {
                timestamp,
                open: parse_field(&record, columns.open, "open", line)?,
                high: parse_field(&record, columns.high, "high", line)?,
                low: parse_field(&record, columns.low, "low", line)?,
                close: parse_field(&record, columns.close, "close", line)?,
                volume,
            });
        }

        if bars.is_empty() {
            debug!(path = %self.path.display(), "csv file has no rows");
        }
        bars.sort_by_key(|b| b.timestamp);
        info!(path = %self.path.display(), bars = bars.len(), num = N::KIND, "bars loaded");
        BarSeries::new(name, bars, precision)
    }
}
