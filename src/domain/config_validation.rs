//! Configuration validation.
//!
//! Validates every section before a run so bad values fail fast with the
//! offending section and key.

use crate::domain::aggregator::AggregationMode;
use crate::domain::error::ConfluenceError;
use crate::domain::indicator::AverageKind;
use crate::domain::instrument::parse_instruments;
use crate::domain::policy::ScaleInTrade;
use crate::domain::signal::{parse_indicator_list, IndicatorKind};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    validate_backtest_config(config)?;
    validate_signal_config(config)?;
    validate_indicator_config(config)?;
    validate_position_config(config)?;
    validate_report_config(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_slippage(config)?;
    validate_dates(config)?;
    validate_instruments(config)?;
    Ok(())
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let trigger_window = read_usize(config, "signals", "trigger_window", 5)?;
    if trigger_window < 1 {
        return Err(ConfluenceError::invalid(
            "signals",
            "trigger_window",
            "trigger_window must be at least 1",
        ));
    }
    read_usize(config, "signals", "warmup_bars", 0)?;

    if let Some(mode) = config.get_string("signals", "mode") {
        mode.parse::<AggregationMode>()
            .map_err(|e| ConfluenceError::invalid("signals", "mode", e))?;
    }
    if let Some(enabled) = config.get_string("signals", "enabled") {
        parse_indicator_list(&enabled)
            .map_err(|e| ConfluenceError::invalid("signals", "enabled", e.to_string()))?;
    }
    for kind in IndicatorKind::ALL {
        let key = format!("{}_weight", kind.key());
        let weight = config.get_double("signals", &key, 1.0);
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfluenceError::invalid(
                "signals",
                &key,
                "weight must be non-negative",
            ));
        }
    }
    positive(config, "signals", "entry_threshold", 5.0)?;
    positive(config, "signals", "exit_threshold", 5.0)?;
    Ok(())
}

pub fn validate_indicator_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    for (key, default) in [
        ("ma_fast", 9),
        ("ma_slow", 20),
        ("stoch_period", 14),
        ("stoch_smooth_k", 3),
        ("stoch_smooth_d", 3),
        ("stoch_lookback", 3),
        ("mfi_period", 14),
        ("macd_fast", 3),
        ("macd_slow", 10),
        ("macd_signal", 16),
        ("volume_lookback", 35),
    ] {
        if read_usize(config, "indicators", key, default)? < 1 {
            return Err(ConfluenceError::invalid(
                "indicators",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }

    ordered_periods(config, "ma_fast", 9, "ma_slow", 20)?;
    ordered_periods(config, "macd_fast", 3, "macd_slow", 10)?;
    ordered_band(config, "stoch_lower", 20.0, "stoch_upper", 80.0)?;
    ordered_band(config, "mfi_lower", 20.0, "mfi_upper", 80.0)?;

    positive(config, "indicators", "volume_multiplier", 2.0)?;

    if let Some(avg) = config.get_string("indicators", "macd_average") {
        avg.parse::<AverageKind>()?;
    }
    Ok(())
}

pub fn validate_position_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    allocation(config, "first_trade_allocation", 0.1)?;
    allocation(config, "repeat_trade_allocation", 0.1)?;
    allocation(config, "max_allocation", 1.0)?;

    if let Some(mode) = config.get_string("position", "scale_in_trade") {
        mode.parse::<ScaleInTrade>()
            .map_err(|e| ConfluenceError::invalid("position", "scale_in_trade", e))?;
    }

    if config.get_bool("position", "trailing_stop", false) {
        let pct = config.get_double("position", "trailing_stop_pct", 5.0);
        if pct <= 0.0 || pct >= 100.0 {
            return Err(ConfluenceError::invalid(
                "position",
                "trailing_stop_pct",
                "trailing_stop_pct must be between 0 and 100",
            ));
        }
    }
    Ok(())
}

pub fn validate_report_config(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    if let Some(format) = config.get_string("report", "format") {
        match format.trim().to_lowercase().as_str() {
            "csv" | "json" => {}
            other => {
                return Err(ConfluenceError::invalid(
                    "report",
                    "format",
                    format!("unknown format '{other}', expected csv or json"),
                ))
            }
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let value = config.get_double("backtest", "initial_capital", 100_000.0);
    if value <= 0.0 {
        return Err(ConfluenceError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    for key in ["commission_per_trade", "commission_pct"] {
        if config.get_double("backtest", key, 0.0) < 0.0 {
            return Err(ConfluenceError::invalid(
                "backtest",
                key,
                format!("{key} must be non-negative"),
            ));
        }
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let value = config.get_double("backtest", "slippage_pct", 0.0);
    if value < 0.0 {
        return Err(ConfluenceError::invalid(
            "backtest",
            "slippage_pct",
            "slippage_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(ConfluenceError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

pub(crate) fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, ConfluenceError> {
    match value {
        None => Err(ConfluenceError::missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            ConfluenceError::invalid(
                "backtest",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let (key, raw) = instrument_list(config)?;
    parse_instruments(&raw).map_err(|e| ConfluenceError::invalid("backtest", key, e.to_string()))?;
    Ok(())
}

/// The raw `instruments` list, falling back to a single `instrument`.
pub(crate) fn instrument_list(
    config: &dyn ConfigPort,
) -> Result<(&'static str, String), ConfluenceError> {
    match (
        config.get_string("backtest", "instruments"),
        config.get_string("backtest", "instrument"),
    ) {
        (Some(list), _) if !list.trim().is_empty() => Ok(("instruments", list)),
        (_, Some(one)) if !one.trim().is_empty() => Ok(("instrument", one)),
        _ => Err(ConfluenceError::missing("backtest", "instruments")),
    }
}

pub(crate) fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, ConfluenceError> {
    config
        .get_usize(section, key, default)
        .ok_or_else(|| ConfluenceError::invalid(section, key, format!("{key} must be non-negative")))
}

fn positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), ConfluenceError> {
    let value = config.get_double(section, key, default);
    if value <= 0.0 || value.is_nan() {
        return Err(ConfluenceError::invalid(
            section,
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(())
}

fn allocation(config: &dyn ConfigPort, key: &str, default: f64) -> Result<(), ConfluenceError> {
    let value = config.get_double("position", key, default);
    if value <= 0.0 || value > 1.0 {
        return Err(ConfluenceError::invalid(
            "position",
            key,
            format!("{key} must be in (0, 1]"),
        ));
    }
    Ok(())
}

fn ordered_periods(
    config: &dyn ConfigPort,
    fast_key: &str,
    fast_default: usize,
    slow_key: &str,
    slow_default: usize,
) -> Result<(), ConfluenceError> {
    let fast = read_usize(config, "indicators", fast_key, fast_default)?;
    let slow = read_usize(config, "indicators", slow_key, slow_default)?;
    if fast >= slow {
        return Err(ConfluenceError::invalid(
            "indicators",
            fast_key,
            format!("{fast_key} must be less than {slow_key}"),
        ));
    }
    Ok(())
}

fn ordered_band(
    config: &dyn ConfigPort,
    lower_key: &str,
    lower_default: f64,
    upper_key: &str,
    upper_default: f64,
) -> Result<(), ConfluenceError> {
    let lower = config.get_double("indicators", lower_key, lower_default);
    let upper = config.get_double("indicators", upper_key, upper_default);
    if !(0.0..=100.0).contains(&lower) || !(0.0..=100.0).contains(&upper) {
        return Err(ConfluenceError::invalid(
            "indicators",
            lower_key,
            "band levels must be within 0 and 100",
        ));
    }
    if lower >= upper {
        return Err(ConfluenceError::invalid(
            "indicators",
            lower_key,
            format!("{lower_key} must be less than {upper_key}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BACKTEST: &str = "[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\ninstruments = AAPL, MSFT\n";

    fn make_config(extra: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(&format!("{BACKTEST}{extra}")).unwrap()
    }

    fn invalid_key(err: ConfluenceError) -> String {
        match err {
            ConfluenceError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn defaults_pass() {
        assert!(validate_all(&make_config("")).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[signals]
trigger_window = 3
warmup_bars = 50
mode = count
enabled = MA, STOCH, LBR, MFI, VOL
ma_weight = 2.0
entry_threshold = 2
exit_threshold = 1

[indicators]
ma_fast = 5
ma_slow = 30
macd_average = exponential

[position]
first_trade_allocation = 0.25
repeat_trade_allocation = 0.25
max_allocation = 0.75
scale_in_trade = replace
trailing_stop = true
trailing_stop_pct = 7.5

[report]
format = json
"#,
        );
        assert!(validate_all(&config).is_ok());
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = FileConfigAdapter::from_string(&format!("{BACKTEST}initial_capital = 0\n")).unwrap();
        assert_eq!(invalid_key(validate_all(&config).unwrap_err()), "initial_capital");
    }

    #[test]
    fn negative_commission_fails() {
        let config = FileConfigAdapter::from_string(&format!("{BACKTEST}commission_pct = -0.1\n")).unwrap();
        assert_eq!(invalid_key(validate_all(&config).unwrap_err()), "commission_pct");
    }

    #[test]
    fn missing_end_date_fails() {
        let config = FileConfigAdapter::from_string("[backtest]\nstart_date = 2020-01-01\ninstrument = AAPL\n").unwrap();
        let err = validate_all(&config).unwrap_err();
        assert!(matches!(err, ConfluenceError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn bad_date_format_fails() {
        let config = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2020/01/01\nend_date = 2024-12-31\ninstrument = AAPL\n",
        )
        .unwrap();
        assert_eq!(invalid_key(validate_all(&config).unwrap_err()), "start_date");
    }

    #[test]
    fn dates_must_be_ordered() {
        let config = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2024-12-31\nend_date = 2020-01-01\ninstrument = AAPL\n",
        )
        .unwrap();
        assert_eq!(invalid_key(validate_all(&config).unwrap_err()), "start_date");
    }

    #[test]
    fn missing_instruments_fails() {
        let config = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\n",
        )
        .unwrap();
        let err = validate_all(&config).unwrap_err();
        assert!(matches!(err, ConfluenceError::ConfigMissing { key, .. } if key == "instruments"));
    }

    #[test]
    fn duplicate_instrument_fails() {
        let config = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2020-01-01\nend_date = 2024-12-31\ninstruments = AAPL,aapl\n",
        )
        .unwrap();
        assert_eq!(invalid_key(validate_all(&config).unwrap_err()), "instruments");
    }

    #[test]
    fn trigger_window_zero_fails() {
        let err = validate_all(&make_config("[signals]\ntrigger_window = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "trigger_window");
    }

    #[test]
    fn negative_trigger_window_fails() {
        let err = validate_all(&make_config("[signals]\ntrigger_window = -2\n")).unwrap_err();
        assert_eq!(invalid_key(err), "trigger_window");
    }

    #[test]
    fn unknown_indicator_fails() {
        let err = validate_all(&make_config("[signals]\nenabled = MA, RSI\n")).unwrap_err();
        assert_eq!(invalid_key(err), "enabled");
    }

    #[test]
    fn unknown_mode_fails() {
        let err = validate_all(&make_config("[signals]\nmode = sum\n")).unwrap_err();
        assert_eq!(invalid_key(err), "mode");
    }

    #[test]
    fn negative_weight_fails() {
        let err = validate_all(&make_config("[signals]\nvol_weight = -1\n")).unwrap_err();
        assert_eq!(invalid_key(err), "vol_weight");
    }

    #[test]
    fn zero_threshold_fails() {
        let err = validate_all(&make_config("[signals]\nexit_threshold = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "exit_threshold");
    }

    #[test]
    fn fast_ma_must_be_shorter() {
        let err = validate_all(&make_config("[indicators]\nma_fast = 30\nma_slow = 20\n")).unwrap_err();
        assert_eq!(invalid_key(err), "ma_fast");
    }

    #[test]
    fn macd_periods_ordered() {
        let err = validate_all(&make_config("[indicators]\nmacd_fast = 10\n")).unwrap_err();
        assert_eq!(invalid_key(err), "macd_fast");
    }

    #[test]
    fn stoch_band_ordered() {
        let err = validate_all(&make_config("[indicators]\nstoch_lower = 85\n")).unwrap_err();
        assert_eq!(invalid_key(err), "stoch_lower");
    }

    #[test]
    fn zero_period_fails() {
        let err = validate_all(&make_config("[indicators]\nmfi_period = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "mfi_period");
    }

    #[test]
    fn unknown_average_fails() {
        let err = validate_all(&make_config("[indicators]\nmacd_average = wilder\n")).unwrap_err();
        assert_eq!(invalid_key(err), "macd_average");
    }

    #[test]
    fn allocation_above_one_fails() {
        let err = validate_all(&make_config("[position]\nmax_allocation = 1.5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "max_allocation");
    }

    #[test]
    fn allocation_zero_fails() {
        let err = validate_all(&make_config("[position]\nfirst_trade_allocation = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "first_trade_allocation");
    }

    #[test]
    fn trailing_stop_pct_checked_only_when_enabled() {
        assert!(validate_all(&make_config("[position]\ntrailing_stop_pct = 150\n")).is_ok());
        let err = validate_all(&make_config(
            "[position]\ntrailing_stop = true\ntrailing_stop_pct = 150\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(err), "trailing_stop_pct");
    }

    #[test]
    fn unknown_report_format_fails() {
        let err = validate_all(&make_config("[report]\nformat = xml\n")).unwrap_err();
        assert_eq!(invalid_key(err), "format");
    }
}
