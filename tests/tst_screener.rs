use nse_oi_signals::screener::{
    allocation_per_symbol, predict_holding_period, read_bars, run_backtest, BacktestConfig, Bar,
    HoltForecast,
};
use nse_oi_signals::ScreenerError;

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(points: &[(f64, f64)]) -> Vec<Bar> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(close, volume))| Bar {
                date: Some(format!("2025-10-{:02}", i + 1)),
                close,
                volume,
            })
            .collect()
    }

    fn small_window() -> BacktestConfig {
        BacktestConfig {
            average_window: 3,
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn test_read_bars_drops_incomplete_rows() {
        let csv = "Date,Open,Close,Volume\n\
                   2025-10-01,99,100,1000\n\
                   2025-10-02,100,,1200\n\
                   2025-10-03,101,102,\n\
                   2025-10-06,102,104,900\n";
        let bars = read_bars(csv.as_bytes()).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date.as_deref(), Some("2025-10-01"));
        assert_eq!(bars[1].close, 104.0);
    }

    #[test]
    fn test_read_bars_without_date() {
        let bars = read_bars("Close,Volume\n10,5\n".as_bytes()).unwrap();
        assert_eq!(bars, vec![Bar { date: None, close: 10.0, volume: 5.0 }]);
    }

    #[test]
    fn test_read_bars_tolerates_padded_headers() {
        let csv = "Date, Close , Volume\n2025-10-01,100,1000\n";
        let bars = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(
            bars,
            vec![Bar { date: Some("2025-10-01".to_string()), close: 100.0, volume: 1000.0 }]
        );
    }

    #[test]
    fn test_read_bars_requires_close_and_volume() {
        match read_bars("Date,Close\n2025-10-01,100\n".as_bytes()) {
            Err(ScreenerError::MissingColumns(missing)) => assert_eq!(missing, vec!["Volume"]),
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_signal_follows_spike_by_one_bar() {
        // Window 3 averages 1733.3 throughout; only bar 2 exceeds twice that
        let data = bars(&[
            (100.0, 100.0),
            (100.0, 100.0),
            (110.0, 5_000.0),
            (121.0, 100.0),
            (108.9, 100.0),
        ]);
        let report = run_backtest(&data, &small_window());

        let unusual: Vec<bool> = report.rows.iter().map(|r| r.unusual_volume).collect();
        let signal: Vec<bool> = report.rows.iter().map(|r| r.signal).collect();
        assert_eq!(unusual, vec![false, false, true, false, false]);
        assert_eq!(signal, vec![false, false, false, true, false]);

        assert_eq!(report.rows[0].daily_return, None);
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.winning_trades, 1);
        assert_eq!(report.losing_trades, 0);
        assert_eq!(report.win_rate, 1.0);

        let last = report.rows.last().unwrap();
        // Market: 100 -> 108.9; strategy only holds the +10% bar
        assert!((last.cumulative_market_return - 1.089).abs() < 1e-9);
        assert!((last.cumulative_strategy_return - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_swing_buy_needs_close_above_vwap() {
        // Spike bar closes above the running VWAP
        let up = run_backtest(
            &bars(&[(100.0, 100.0), (100.0, 100.0), (120.0, 1_000.0), (121.0, 100.0)]),
            &small_window(),
        );
        assert!(up.rows[3].swing_buy);
        assert_eq!(up.swing_buys().count(), 1);

        // Spike bar closes below it
        let down = run_backtest(
            &bars(&[(100.0, 100.0), (100.0, 100.0), (80.0, 1_000.0), (81.0, 100.0)]),
            &small_window(),
        );
        assert!(down.rows[3].signal);
        assert!(!down.rows[3].swing_buy);
    }

    #[test]
    fn test_holding_period_counts_bars_to_target() {
        // Swing buy at 121 on bar 3; 127.05 first reached on bar 5
        let data = bars(&[
            (100.0, 100.0),
            (100.0, 100.0),
            (120.0, 1_000.0),
            (121.0, 100.0),
            (125.0, 100.0),
            (128.0, 100.0),
        ]);
        let report = run_backtest(&data, &small_window());

        assert_eq!(report.swing_buys().count(), 1);
        assert_eq!(report.holding_period, 2);

        let latest = report.latest_signal.as_ref().unwrap();
        assert_eq!(latest.date.as_deref(), Some("2025-10-04"));
        assert_eq!(latest.buy_price, 121.0);
        assert!((latest.holding_target - 127.05).abs() < 1e-9);
        assert_eq!(report.holding_target(), Some(latest.holding_target));
        assert_eq!(latest.current_price, 128.0);
        assert!(latest.target_achieved);
        assert_eq!(latest.quantity, 20);
        assert!((latest.profit_loss - 140.0).abs() < 1e-9);
    }

    #[test]
    fn test_holding_period_defaults_without_signals() {
        let flat = run_backtest(&bars(&[(100.0, 100.0); 25]), &BacktestConfig::default());
        assert_eq!(flat.holding_period, 20);
        assert!(flat.latest_signal.is_none());
        assert_eq!(flat.holding_target(), None);

        // Swing buy whose target is never reached
        let stalled = run_backtest(
            &bars(&[(100.0, 100.0), (100.0, 100.0), (120.0, 1_000.0), (121.0, 100.0), (119.0, 100.0)]),
            &small_window(),
        );
        assert_eq!(stalled.swing_buys().count(), 1);
        assert_eq!(stalled.holding_period, 20);

        let latest = stalled.latest_signal.unwrap();
        assert!(!latest.target_achieved);
        assert!((latest.profit_loss - -40.0).abs() < 1e-9);
    }

    #[test]
    fn test_holding_period_is_truncated_mean() {
        let mut rows = run_backtest(
            &bars(&[(100.0, 1.0), (90.0, 1.0), (105.0, 1.0), (95.0, 1.0), (99.0, 1.0), (99.5, 1.0)]),
            &small_window(),
        )
        .rows;
        for row in rows.iter_mut() {
            row.swing_buy = false;
        }
        // 100 -> 105 in 2 bars, 90 -> 94.5 in 1 bar
        rows[0].swing_buy = true;
        rows[1].swing_buy = true;
        assert_eq!(predict_holding_period(&rows, 0.05, 20), 1);

        // 95 -> 99.75 is never reached, so it does not count
        rows[3].swing_buy = true;
        assert_eq!(predict_holding_period(&rows, 0.05, 20), 1);
    }

    #[test]
    fn test_no_trades_means_zero_win_rate() {
        let flat = bars(&[(100.0, 100.0); 25]);
        let report = run_backtest(&flat, &BacktestConfig::default());

        assert_eq!(report.total_trades, 0);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.forecast.len(), 5);
        for value in &report.forecast {
            assert!((value - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_short_series_skips_forecast() {
        let report = run_backtest(&bars(&[(100.0, 10.0), (101.0, 10.0)]), &BacktestConfig::default());
        assert!(report.forecast.is_empty());
        assert_eq!(report.rows.len(), 2);
    }

    #[test]
    fn test_holt_tracks_trend() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 + 1.5 * i as f64).collect();
        let mut model = HoltForecast::new(0.3, 0.1).unwrap();
        model.fit(&closes).unwrap();

        let (level, trend) = model.components();
        assert!((level - 243.5).abs() < 1e-6);
        assert!((trend - 1.5).abs() < 1e-6);

        let forecast = model.predict(5);
        assert_eq!(forecast.len(), 5);
        assert!((forecast[4] - 251.0).abs() < 1e-6);
    }

    #[test]
    fn test_capital_allocation() {
        assert_eq!(allocation_per_symbol(20_000.0, 5), Some(4_000.0));
        assert_eq!(allocation_per_symbol(20_000.0, 0), None);
    }
}
