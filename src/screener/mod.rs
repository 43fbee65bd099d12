pub mod backtest;
pub mod forecast;

pub use backtest::{
    allocation_per_symbol, latest_signal, predict_holding_period, read_bars, run_backtest, BacktestConfig,
    BacktestReport, BacktestRow, Bar, LatestSignal,
};
pub use forecast::{forecast_prices, HoltForecast};
