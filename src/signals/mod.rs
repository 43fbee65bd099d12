pub mod history;
pub mod metrics;
pub mod processor;
pub mod rules;

// Re-exports (public API)
pub use history::{
    read_history, signal_counts, AccumulatorState, HistoryRecord, OptionSide, Portfolio,
    SignalHistoryEntry, Trade, HISTORY_COLUMNS,
};
pub use metrics::{
    percentage_oi_change, rolling_average, simple_moving_average, volume_weighted_average_price,
};
pub use processor::{
    atm_neighbourhood, find_atm_strike, ingest_chain, ingest_strikes, top_by_oi_change,
    MarketContext, OptionSnapshotRow, StrikeWindow,
};
pub use rules::{label_rows, signal_label, PcrGate, SignalConfig, SignalLabel, Trigger};
