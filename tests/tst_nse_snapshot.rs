use chrono::{FixedOffset, TimeZone};
use nse_oi_signals::nse::{process_and_export, process_snapshot, Instrument, OptionChain};
use nse_oi_signals::screener::BacktestConfig;
use nse_oi_signals::signals::{AccumulatorState, OptionSide, SignalConfig, SignalLabel};
use nse_oi_signals::{AppConfig, IngestError};
use std::path::PathBuf;
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    fn config(paper_quantity: Option<u32>) -> AppConfig {
        AppConfig {
            mode: "once".to_string(),
            symbol: "NIFTY".to_string(),
            expiry: Some("21-Oct-2025".to_string()),
            refresh_interval: Duration::from_secs(180),
            max_cycles: Some(1),
            top_n: 2,
            history_file: PathBuf::from("signal_history.csv"),
            bars_files: Vec::new(),
            capital: 20_000.0,
            paper_quantity,
            signal: SignalConfig::canonical(),
            backtest: BacktestConfig::default(),
        }
    }

    fn strike_json(strike: u32, call_chg: i64, put_chg: i64) -> String {
        format!(
            r#"{{"strikePrice": {strike},
                "CE": {{"openInterest": 10000, "changeinOpenInterest": {call_chg}, "lastPrice": 120.0}},
                "PE": {{"openInterest": 12000, "changeinOpenInterest": {put_chg}, "lastPrice": 95.5}}}}"#
        )
    }

    fn chain(strikes: &[String], underlying: f64) -> OptionChain {
        let json = format!(
            r#"{{"records": {{"timestamp": "17-Oct-2025 10:00:00", "underlyingValue": {underlying}}},
                "filtered": {{"data": [{}]}}}}"#,
            strikes.join(",")
        );
        serde_json::from_str(&json).unwrap()
    }

    fn now() -> chrono::DateTime<FixedOffset> {
        FixedOffset::east_opt(19_800)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 17, 10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_snapshot_is_windowed_labeled_and_recorded() {
        let chain = chain(
            &[
                strike_json(21000, 0, 0),
                strike_json(22450, 100, 900),
                strike_json(22500, 800, 100),
                strike_json(22550, 10, 10),
                strike_json(24000, 5_000, 0),
            ],
            22510.0,
        );

        let mut state = AccumulatorState::new();
        let report = process_snapshot(
            &chain,
            Some(22490.0),
            Instrument::Nifty,
            "21-Oct-2025",
            &config(None),
            &mut state,
            now(),
        )
        .unwrap();

        assert_eq!(report.context.spot_price, 22490.0);
        assert_eq!(report.window.anchor, 22500.0);
        // 21000 and 24000 fall outside [21500, 23500]
        let strikes: Vec<f64> = report.labeled.iter().map(|(r, _)| r.strike).collect();
        assert_eq!(strikes, vec![22450.0, 22500.0, 22550.0]);

        // PCR uses every ingested strike
        assert_eq!(report.context.put_call_ratio, Some(1.2));

        assert_eq!(report.label_count(SignalLabel::BuyCall), 1);
        assert_eq!(report.label_count(SignalLabel::BuyPut), 1);
        assert_eq!(report.label_count(SignalLabel::Hold), 1);

        assert_eq!(report.appended, 2);
        assert_eq!(state.len(), 2);
        assert_eq!(state.entries()[0].row.strike, 22450.0);
        assert_eq!(state.entries()[0].row.timestamp, "17-Oct-2025 10:00:00");
        assert!(report.paper_trade.is_none());
    }

    #[test]
    fn test_missing_spot_uses_underlying() {
        let chain = chain(&[strike_json(22500, 0, 0)], 22510.0);
        let mut state = AccumulatorState::new();

        let report = process_snapshot(
            &chain,
            None,
            Instrument::Nifty,
            "21-Oct-2025",
            &config(None),
            &mut state,
            now(),
        )
        .unwrap();
        assert_eq!(report.context.spot_price, 22510.0);
    }

    #[test]
    fn test_paper_trade_on_strongest_buy() {
        let chain = chain(
            &[strike_json(22450, 100, 900), strike_json(22500, 1_500, 100)],
            22500.0,
        );
        let mut state = AccumulatorState::new();

        let report = process_snapshot(
            &chain,
            Some(22500.0),
            Instrument::Nifty,
            "21-Oct-2025",
            &config(Some(50)),
            &mut state,
            now(),
        )
        .unwrap();

        let trade = report.paper_trade.unwrap();
        assert_eq!(trade.side, OptionSide::Put);
        assert_eq!(trade.strike, 22500.0);
        assert_eq!(trade.entry_price, 95.5);
        assert_eq!(state.portfolio().trades().len(), 1);
    }

    #[test]
    fn test_unwritable_history_keeps_cycle() {
        let chain = chain(
            &[strike_json(22450, 100, 900), strike_json(22500, 1_500, 100)],
            22500.0,
        );
        let cfg = AppConfig {
            history_file: PathBuf::from("/nonexistent_dir/signal_history.csv"),
            ..config(Some(10))
        };
        let mut state = AccumulatorState::new();

        let report = process_and_export(
            &chain,
            Some(22500.0),
            Instrument::Nifty,
            "21-Oct-2025",
            &cfg,
            &mut state,
            now(),
        )
        .unwrap();

        assert!(!report.exported);
        assert!(report.appended > 0);
        assert_eq!(state.len(), report.appended);
        assert!(report.paper_trade.is_some());
        assert_eq!(state.portfolio().trades().len(), 1);
    }

    #[test]
    fn test_export_rewrites_history_file() {
        let path = std::env::temp_dir().join(format!("nse_oi_history_{}.csv", std::process::id()));
        let cfg = AppConfig {
            history_file: path.clone(),
            ..config(None)
        };
        let mut state = AccumulatorState::new();

        let report = process_and_export(
            &chain(&[strike_json(22500, 800, 100)], 22500.0),
            Some(22500.0),
            Instrument::Nifty,
            "21-Oct-2025",
            &cfg,
            &mut state,
            now(),
        )
        .unwrap();
        assert!(report.exported);

        let written = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(written.lines().count(), 1 + state.len());
        assert!(written.starts_with("Strike_Price,"));
    }

    #[test]
    fn test_malformed_chain_fails_cycle() {
        let json = r#"{"records": {"timestamp": "t", "underlyingValue": 22500},
                       "filtered": {"data": [{"strikePrice": 22500, "CE": {"openInterest": 1}}]}}"#;
        let chain: OptionChain = serde_json::from_str(json).unwrap();
        let mut state = AccumulatorState::new();

        let result = process_snapshot(
            &chain,
            Some(22500.0),
            Instrument::Nifty,
            "21-Oct-2025",
            &config(None),
            &mut state,
            now(),
        );
        assert!(matches!(result, Err(IngestError::MissingField { side: "CE", .. })));
        assert!(state.is_empty());
    }
}
