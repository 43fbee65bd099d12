use chrono::{DateTime, FixedOffset, TimeZone};
use nse_oi_signals::signals::{
    read_history, signal_counts, AccumulatorState, OptionSide, OptionSnapshotRow, Portfolio,
    SignalLabel, HISTORY_COLUMNS,
};
use nse_oi_signals::IngestError;

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        ist.with_ymd_and_hms(2025, 10, 17, hour, minute, 0).unwrap()
    }

    fn labeled(strike: f64, call_chg: f64, put_chg: f64, label: SignalLabel) -> (OptionSnapshotRow, SignalLabel) {
        (
            OptionSnapshotRow::new(strike, (1_000.0, call_chg, 12.5), (2_000.0, put_chg, 8.0)),
            label,
        )
    }

    #[test]
    fn test_three_cycles_export_in_append_order() {
        let mut state = AccumulatorState::new();

        let first = vec![
            labeled(22400.0, 10.0, 30.0, SignalLabel::BuyCall),
            labeled(22500.0, 100.0, 500.0, SignalLabel::BuyCall),
            labeled(22600.0, 0.0, 1.0, SignalLabel::Hold),
        ];
        let second = vec![labeled(22500.0, 700.0, 100.0, SignalLabel::BuyPut)];
        let third = vec![
            labeled(22450.0, 5.0, 5.0, SignalLabel::Hold),
            labeled(22550.0, 50.0, 50.0, SignalLabel::Hold),
        ];

        assert_eq!(state.record_cycle(&first, at(9, 15), 2), 2);
        assert_eq!(state.record_cycle(&second, at(9, 18), 2), 1);
        assert_eq!(state.record_cycle(&third, at(9, 21), 2), 2);

        assert_eq!(state.len(), 5);
        assert_eq!(state.capture_times().len(), 3);
        assert_eq!(state.buy_signals().count(), 3);

        let csv = state.export_csv_string().unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], HISTORY_COLUMNS.join(","));
        assert_eq!(
            lines[0],
            "Strike_Price,CE_OI,CE_CHG_OI,CE_LTP,PE_OI,PE_CHG_OI,PE_LTP,Signal,Time"
        );
        assert_eq!(lines.len(), 6);

        // Within a cycle rows are ranked by combined OI change
        assert_eq!(lines[1], "22500.0,1000.0,100.0,12.5,2000.0,500.0,8.0,BUY CE,09:15");
        assert!(lines[2].starts_with("22400.0,") && lines[2].ends_with(",BUY CE,09:15"));
        assert!(lines[3].starts_with("22500.0,") && lines[3].ends_with(",BUY PE,09:18"));
        assert!(lines[4].starts_with("22550.0,") && lines[4].ends_with(",HOLD,09:21"));
        assert!(lines[5].starts_with("22450.0,") && lines[5].ends_with(",HOLD,09:21"));
    }

    #[test]
    fn test_empty_history_still_has_header() {
        let state = AccumulatorState::new();
        assert!(state.is_empty());
        assert_eq!(state.export_csv_string().unwrap().trim_end(), HISTORY_COLUMNS.join(","));
    }

    #[test]
    fn test_export_reads_back() {
        let mut state = AccumulatorState::new();
        state.record_cycle(
            &[
                labeled(22500.0, 100.0, 500.0, SignalLabel::BuyCall),
                labeled(22600.0, 900.0, 10.0, SignalLabel::StrongBuyPut),
            ],
            at(14, 5),
            5,
        );

        let csv = state.export_csv_string().unwrap();
        let records = read_history(csv.as_bytes()).unwrap();

        assert_eq!(records, state.records());
        assert_eq!(records[0].signal, SignalLabel::StrongBuyPut);
        assert_eq!(records[0].time, "14:05");
    }

    #[test]
    fn test_read_history_missing_columns() {
        let csv = "Strike_Price,CE_OI,CE_CHG_OI,PE_OI,PE_CHG_OI,Signal\n22500,1,2,3,4,HOLD\n";
        match read_history(csv.as_bytes()) {
            Err(IngestError::MissingColumns(missing)) => {
                assert_eq!(missing, vec!["CE_LTP", "PE_LTP", "Time"]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_read_history_padded_headers() {
        let csv = format!("{}\n22500,1,2,3,4,5,6,BUY CE,09:15\n", HISTORY_COLUMNS.join(", "));
        let records = read_history(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].strike, 22500.0);
        assert_eq!(records[0].signal, SignalLabel::BuyCall);
        assert_eq!(records[0].time, "09:15");
    }

    #[test]
    fn test_read_history_rejects_unknown_label() {
        let csv = format!("{}\n22500,1,2,3,4,5,6,MAYBE,09:15\n", HISTORY_COLUMNS.join(","));
        assert!(read_history(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_signal_counts_per_strike() {
        let csv = format!(
            "{}\n{}\n{}\n{}\n{}\n",
            HISTORY_COLUMNS.join(","),
            "22600,1,2,3,4,5,6,BUY PE,09:15",
            "22500,1,2,3,4,5,6,BUY CE,09:15",
            "22500,1,2,3,4,5,6,BUY CE,09:18",
            "22500,1,2,3,4,5,6,HOLD,09:21",
        );
        let records = read_history(csv.as_bytes()).unwrap();
        let counts = signal_counts(&records);

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].0, 22500.0);
        assert_eq!(counts[0].1.get(&SignalLabel::BuyCall), Some(&2));
        assert_eq!(counts[0].1.get(&SignalLabel::Hold), Some(&1));
        assert_eq!(counts[1].0, 22600.0);
        assert_eq!(counts[1].1.get(&SignalLabel::BuyPut), Some(&1));
    }

    #[test]
    fn test_portfolio_from_signals() {
        let rows = vec![
            labeled(22500.0, 100.0, 500.0, SignalLabel::BuyCall),
            labeled(22600.0, 900.0, 10.0, SignalLabel::BuyPut),
        ];

        let mut portfolio = Portfolio::default();
        assert!(portfolio.execute_signal(SignalLabel::Hold, &rows, 50).is_none());
        assert!(portfolio.execute_signal(SignalLabel::StrongBuyCall, &rows, 50).is_none());

        let trade = portfolio.execute_signal(SignalLabel::BuyCall, &rows, 50).unwrap();
        assert_eq!(trade.side, OptionSide::Call);
        assert_eq!(trade.strike, 22500.0);
        assert_eq!(trade.entry_price, 12.5);

        portfolio.execute(OptionSide::Put, 22600.0, 25, 8.0);
        assert_eq!(portfolio.trades().len(), 2);

        let mut later_call = OptionSnapshotRow::new(22500.0, (1_000.0, 0.0, 15.0), (2_000.0, 0.0, 6.0));
        later_call.timestamp = "later".to_string();
        let later_put = OptionSnapshotRow::new(22600.0, (1_000.0, 0.0, 9.0), (2_000.0, 0.0, 7.0));

        // (15 - 12.5) * 50 + (7 - 8) * 25
        assert_eq!(portfolio.mark_to_market(&[later_call.clone(), later_put]), 100.0);
        // Missing strikes are skipped
        assert_eq!(portfolio.mark_to_market(&[later_call]), 125.0);
    }

    #[test]
    fn test_state_owns_portfolio() {
        let mut state = AccumulatorState::new();
        state.portfolio_mut().execute(OptionSide::Call, 22500.0, 1, 10.0);
        assert_eq!(state.portfolio().trades().len(), 1);
        assert!(state.is_empty());
    }
}
