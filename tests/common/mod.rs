#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabacktest::domain::bar::Bar;
use tabacktest::domain::config_validation::{DataSettings, Settings, StrategySettings};
use tabacktest::domain::error::BacktestError;
use tabacktest::domain::num::{Num, NumMode, Precision};
use tabacktest::domain::runner::RunConfig;
use tabacktest::domain::series::BarSeries;
use tabacktest::ports::data_port::DataPort;

pub fn day(offset: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(offset as i64)
}

pub fn make_bars<N: Num>(closes: &[N]) -> Vec<Bar<N>> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: day(i),
            open: close,
            high: close,
            low: close,
            close,
            volume: N::from_usize(1000),
        })
        .collect()
}

pub fn make_series<N: Num>(closes: &[N]) -> Arc<BarSeries<N>> {
    BarSeries::new("TEST", make_bars(closes), Precision::default())
        .unwrap()
        .shared()
}

/// 1, 2, ..., n
pub fn linear_rise(n: usize) -> Vec<f64> {
    rise_from(1.0, n)
}

/// `n` closes climbing by one from `start`.
pub fn rise_from(start: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + i as f64).collect()
}

pub struct MockDataPort<N: Num> {
    pub bars: Vec<Bar<N>>,
    pub error: Option<String>,
}

impl<N: Num> MockDataPort<N> {
    pub fn new(closes: &[N]) -> Self {
        Self {
            bars: make_bars(closes),
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            bars: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl<N: Num> DataPort<N> for MockDataPort<N> {
    fn fetch_series(
        &self,
        name: &str,
        precision: Precision,
    ) -> Result<BarSeries<N>, BacktestError> {
        if let Some(reason) = &self.error {
            return Err(BacktestError::Data {
                reason: reason.clone(),
            });
        }
        BarSeries::new(name, self.bars.clone(), precision)
    }
}

pub fn settings(entry: &str, exit: &str) -> Settings {
    Settings {
        numeric: NumMode::default(),
        data: DataSettings {
            path: PathBuf::from("unused.csv"),
            name: "mock".to_string(),
        },
        strategy: StrategySettings {
            name: "test strategy".to_string(),
            entry: entry.to_string(),
            exit: exit.to_string(),
            unstable_bars: 0,
        },
        run: RunConfig::default(),
    }
}

pub fn write_temp(dir: &Path, file_name: &str, content: &str) -> PathBuf {
    let path = dir.join(file_name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    path
}

/// CSV text with one daily bar per close.
pub fn csv_of(closes: &[f64]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for (i, close) in closes.iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{},1000\n",
            day(i).format("%Y-%m-%d"),
            close,
            close,
            close,
            close
        ));
    }
    out
}
