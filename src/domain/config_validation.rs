//! Configuration validation.
//!
//! Each `validate_*` function checks one INI section and returns the typed
//! settings it describes, so a config that validates can be run as-is.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::error::BacktestError;
use crate::domain::num::{FloatBits, MAX_DECIMAL_SCALE, NumMode, Precision, Rounding};
use crate::domain::rule_parser;
use crate::domain::runner::RunConfig;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSettings {
    pub path: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySettings {
    pub name: String,
    pub entry: String,
    pub exit: String,
    pub unstable_bars: usize,
}

/// Everything a backtest run needs, taken from one config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub numeric: NumMode,
    pub data: DataSettings,
    pub strategy: StrategySettings,
    pub run: RunConfig,
}

/// Validate every section. `data_override` replaces `[data] path`.
pub fn validate_config(
    config: &dyn ConfigPort,
    data_override: Option<&Path>,
) -> Result<Settings, BacktestError> {
    Ok(Settings {
        numeric: validate_numeric_config(config)?,
        data: validate_data_config(config, data_override)?,
        strategy: validate_strategy_config(config)?,
        run: validate_backtest_config(config)?,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BacktestError {
    BacktestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> BacktestError {
    BacktestError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Parse an optional key with `FromStr`, falling back to `T::default()`.
fn parse_or_default<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<T, BacktestError>
where
    T: FromStr<Err = String> + Default,
{
    match config.get_non_empty(section, key) {
        Some(value) => value.parse().map_err(|reason| invalid(section, key, reason)),
        None => Ok(T::default()),
    }
}

fn parse_index(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, BacktestError> {
    config
        .get_non_empty(section, key)
        .map(|value| {
            value.parse::<usize>().map_err(|_| {
                invalid(section, key, format!("'{}' is not a non-negative integer", value))
            })
        })
        .transpose()
}

pub fn validate_numeric_config(config: &dyn ConfigPort) -> Result<NumMode, BacktestError> {
    let mode = config
        .get_non_empty("numeric", "mode")
        .unwrap_or_else(|| "decimal".to_string())
        .to_lowercase();

    match mode.as_str() {
        "decimal" => {
            let default = Precision::default();
            let scale = match config.get_non_empty("numeric", "scale") {
                Some(value) => value
                    .parse::<u32>()
                    .ok()
                    .filter(|s| *s <= MAX_DECIMAL_SCALE)
                    .ok_or_else(|| {
                        let reason = format!(
                            "scale must be an integer between 0 and {}",
                            MAX_DECIMAL_SCALE
                        );
                        invalid("numeric", "scale", reason)
                    })?,
                None => default.scale,
            };
            let rounding = match config.get_non_empty("numeric", "rounding") {
                Some(value) => Rounding::from_str(&value)
                    .map_err(|reason| invalid("numeric", "rounding", reason))?,
                None => default.rounding,
            };
            Ok(NumMode::Decimal(Precision { scale, rounding }))
        }
        "float" => match config.get_non_empty("numeric", "bits").as_deref() {
            Some("32") => Ok(NumMode::Float(FloatBits::F32)),
            Some("64") | None => Ok(NumMode::Float(FloatBits::F64)),
            Some(other) => Err(invalid(
                "numeric",
                "bits",
                format!("bits must be 32 or 64, found '{}'", other),
            )),
        },
        other => Err(invalid(
            "numeric",
            "mode",
            format!("unknown mode '{}' (expected decimal or float)", other),
        )),
    }
}

pub fn validate_data_config(
    config: &dyn ConfigPort,
    data_override: Option<&Path>,
) -> Result<DataSettings, BacktestError> {
    let path = match data_override {
        Some(path) => path.to_path_buf(),
        None => config
            .get_non_empty("data", "path")
            .map(PathBuf::from)
            .ok_or_else(|| missing("data", "path"))?,
    };
    let name = config
        .get_non_empty("data", "name")
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "series".to_string());
    Ok(DataSettings { path, name })
}

pub fn validate_strategy_config(
    config: &dyn ConfigPort,
) -> Result<StrategySettings, BacktestError> {
    let entry = config
        .get_non_empty("strategy", "entry")
        .ok_or_else(|| missing("strategy", "entry"))?;
    let exit = config
        .get_non_empty("strategy", "exit")
        .ok_or_else(|| missing("strategy", "exit"))?;

    rule_parser::parse(&entry)?;
    rule_parser::parse(&exit)?;

    let unstable_bars = match config.get_non_empty("strategy", "unstable_bars") {
        Some(value) => value.parse::<usize>().map_err(|_| {
            invalid(
                "strategy",
                "unstable_bars",
                "unstable_bars must be a non-negative integer",
            )
        })?,
        None => 0,
    };

    Ok(StrategySettings {
        name: config
            .get_non_empty("strategy", "name")
            .unwrap_or_else(|| "strategy".to_string()),
        entry,
        exit,
        unstable_bars,
    })
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<RunConfig, BacktestError> {
    let start_index = parse_index(config, "backtest", "start_index")?;
    let end_index = parse_index(config, "backtest", "end_index")?;
    if let (Some(start), Some(end)) = (start_index, end_index) {
        if start > end {
            return Err(invalid(
                "backtest",
                "start_index",
                "start_index must not be after end_index",
            ));
        }
    }

    Ok(RunConfig {
        side: parse_or_default(config, "backtest", "side")?,
        price: parse_or_default(config, "backtest", "price")?,
        end_of_series: parse_or_default(config, "backtest", "end_of_series")?,
        start_index,
        end_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::bar::PriceField;
    use crate::domain::position::TradeSide;
    use crate::domain::runner::EndOfSeries;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const STRATEGY: &str =
        "[strategy]\nentry = CROSS_ABOVE(SMA(5), SMA(30))\nexit = STOP_LOSS(close, 3)\n";

    #[test]
    fn full_config_validates() {
        let config = make_config(
            r#"
[numeric]
mode = decimal
scale = 8
rounding = half_even

[data]
path = data/bitstamp.csv
name = bitstamp

[strategy]
name = SMA crossover
entry = OR(CROSS_ABOVE(SMA(5), SMA(30)), CROSS_BELOW(close, 800))
exit = OR(CROSS_BELOW(SMA(5), SMA(30)), STOP_LOSS(close, 3), STOP_GAIN(close, 2))
unstable_bars = 30

[backtest]
side = short
price = typical
end_of_series = open
start_index = 5
end_index = 100
"#,
        );
        let settings = validate_config(&config, None).unwrap();
        assert_eq!(
            settings.numeric,
            NumMode::Decimal(Precision {
                scale: 8,
                rounding: Rounding::HalfEven
            })
        );
        assert_eq!(settings.data.name, "bitstamp");
        assert_eq!(settings.data.path, PathBuf::from("data/bitstamp.csv"));
        assert_eq!(settings.strategy.name, "SMA crossover");
        assert_eq!(settings.strategy.unstable_bars, 30);
        assert_eq!(settings.run.side, TradeSide::Short);
        assert_eq!(settings.run.price, PriceField::Typical);
        assert_eq!(settings.run.end_of_series, EndOfSeries::LeaveOpen);
        assert_eq!(settings.run.start_index, Some(5));
        assert_eq!(settings.run.end_index, Some(100));
    }

    #[test]
    fn defaults_apply_when_sections_are_sparse() {
        let config = make_config(&format!("[data]\npath = bars.csv\n{}", STRATEGY));
        let settings = validate_config(&config, None).unwrap();
        assert_eq!(settings.numeric, NumMode::Decimal(Precision::default()));
        assert_eq!(settings.data.name, "bars");
        assert_eq!(settings.strategy.unstable_bars, 0);
        assert_eq!(settings.run.side, TradeSide::Long);
        assert_eq!(settings.run.end_of_series, EndOfSeries::ForceClose);
        assert_eq!(settings.run.start_index, None);
    }

    #[test]
    fn float_mode_bits() {
        let config = make_config("[numeric]\nmode = float\nbits = 32\n");
        assert_eq!(
            validate_numeric_config(&config).unwrap(),
            NumMode::Float(FloatBits::F32)
        );
        let config = make_config("[numeric]\nmode = float\nbits = 16\n");
        let err = validate_numeric_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "bits"));
        let config = make_config("[numeric]\nmode = float\n");
        assert_eq!(
            validate_numeric_config(&config).unwrap(),
            NumMode::Float(FloatBits::F64)
        );
    }

    #[test]
    fn malformed_bits_is_rejected() {
        let config = make_config("[numeric]\nmode = float\nbits = abc\n");
        let err = validate_numeric_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { ref key, .. } if key == "bits"));
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_mode_fails() {
        let config = make_config("[numeric]\nmode = bigint\n");
        let err = validate_numeric_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "mode"));
    }

    #[test]
    fn scale_out_of_range_fails() {
        let config = make_config("[numeric]\nmode = decimal\nscale = 29\n");
        let err = validate_numeric_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "scale"));
    }

    #[test]
    fn unknown_rounding_fails() {
        let config = make_config("[numeric]\nrounding = sideways\n");
        let err = validate_numeric_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "rounding"));
    }

    #[test]
    fn missing_data_path_fails() {
        let config = make_config("[data]\nname = x\n");
        let err = validate_data_config(&config, None).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "path"));
    }

    #[test]
    fn data_override_replaces_path() {
        let config = make_config("[data]\npath = a.csv\n");
        let data = validate_data_config(&config, Some(Path::new("/tmp/b.csv"))).unwrap();
        assert_eq!(data.path, PathBuf::from("/tmp/b.csv"));
        assert_eq!(data.name, "b");
    }

    #[test]
    fn missing_entry_fails() {
        let config = make_config("[strategy]\nexit = STOP_LOSS(close, 3)\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "entry"));
    }

    #[test]
    fn missing_exit_fails() {
        let config = make_config("[strategy]\nentry = STOP_LOSS(close, 3)\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "exit"));
    }

    #[test]
    fn unparsable_rule_fails() {
        let config =
            make_config("[strategy]\nentry = CROSS_ABOVE(close\nexit = STOP_LOSS(close, 3)\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::RuleParse(_)));
    }

    #[test]
    fn negative_unstable_bars_fails() {
        let config = make_config(&format!("{}unstable_bars = -1\n", STRATEGY));
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "unstable_bars"));
    }

    #[test]
    fn unknown_side_fails() {
        let config = make_config("[backtest]\nside = sideways\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "side"));
    }

    #[test]
    fn unknown_price_field_fails() {
        let config = make_config("[backtest]\nprice = mid\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "price"));
    }

    #[test]
    fn reversed_index_range_fails() {
        let config = make_config("[backtest]\nstart_index = 10\nend_index = 2\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "start_index"));
    }

    #[test]
    fn malformed_index_fails() {
        let config = make_config("[backtest]\nend_index = last\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigInvalid { key, .. } if key == "end_index"));
    }
}
