use super::forecast::{forecast_prices, DEFAULT_ALPHA, DEFAULT_BETA};
use crate::error::ScreenerError;
use crate::signals::metrics::{rolling_average, unusual_volume, volume_weighted_average_price};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// One daily bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: Option<String>,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(rename = "Close")]
    close: Option<f64>,
    #[serde(rename = "Volume")]
    volume: Option<f64>,
}

/// Read bars from a CSV with `Close` and `Volume` columns. Rows missing
/// either value are dropped.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, ScreenerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = ["Close", "Volume"]
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ScreenerError::MissingColumns(missing));
    }

    let mut bars = Vec::new();
    for raw in rdr.deserialize::<RawBar>() {
        let raw = raw?;
        if let (Some(close), Some(volume)) = (raw.close, raw.volume) {
            bars.push(Bar {
                date: raw.date,
                close,
                volume,
            });
        }
    }

    Ok(bars)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub average_window: usize,
    /// Volume above `spike_factor` x average counts as unusual
    pub spike_factor: f64,
    pub forecast_periods: usize,
    pub alpha: f64,
    pub beta: f64,
    /// Gain over the entry close that ends a hold, as a fraction
    pub holding_target_pct: f64,
    /// Holding period reported when no swing buy ever reached its target
    pub default_holding_period: usize,
    /// Shares per swing buy when marking the latest signal
    pub quantity: u32,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            average_window: 20,
            spike_factor: 2.0,
            forecast_periods: 5,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            holding_target_pct: 0.05,
            default_holding_period: 20,
            quantity: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    pub date: Option<String>,
    pub close: f64,
    pub volume: f64,
    pub vwap: Option<f64>,
    pub average_volume: Option<f64>,
    pub unusual_volume: bool,
    /// Previous bar's unusual-volume flag
    pub signal: bool,
    /// Previous bar had unusual volume and closed above VWAP
    pub swing_buy: bool,
    pub daily_return: Option<f64>,
    pub strategy_return: Option<f64>,
    pub cumulative_market_return: f64,
    pub cumulative_strategy_return: f64,
}

/// The most recent swing buy, marked against the last close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestSignal {
    pub date: Option<String>,
    pub buy_price: f64,
    pub holding_target: f64,
    pub current_price: f64,
    pub target_achieved: bool,
    pub quantity: u32,
    pub profit_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub rows: Vec<BacktestRow>,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Mean bars from a swing buy to its holding target
    pub holding_period: usize,
    pub latest_signal: Option<LatestSignal>,
    /// Empty when there are too few bars to fit
    pub forecast: Vec<f64>,
}

impl BacktestReport {
    pub fn swing_buys(&self) -> impl Iterator<Item = &BacktestRow> {
        self.rows.iter().filter(|r| r.swing_buy)
    }

    pub fn holding_target(&self) -> Option<f64> {
        self.latest_signal.as_ref().map(|s| s.holding_target)
    }
}

/// Mean number of bars between each swing buy and the first close at or
/// above `entry * (1 + target_pct)`, truncated. Swing buys whose target is
/// never reached are left out; `default` when none reached it.
pub fn predict_holding_period(rows: &[BacktestRow], target_pct: f64, default: usize) -> usize {
    let periods: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.swing_buy)
        .filter_map(|(i, row)| {
            let target = row.close * (1.0 + target_pct);
            rows[i..].iter().position(|later| later.close >= target)
        })
        .collect();

    if periods.is_empty() {
        default
    } else {
        periods.iter().sum::<usize>() / periods.len()
    }
}

/// Mark the last swing buy against the final close
pub fn latest_signal(rows: &[BacktestRow], cfg: &BacktestConfig) -> Option<LatestSignal> {
    let signal = rows.iter().rev().find(|r| r.swing_buy)?;
    let current_price = rows.last()?.close;
    let holding_target = signal.close * (1.0 + cfg.holding_target_pct);

    Some(LatestSignal {
        date: signal.date.clone(),
        buy_price: signal.close,
        holding_target,
        current_price,
        target_achieved: current_price >= holding_target,
        quantity: cfg.quantity,
        profit_loss: (current_price - signal.close) * f64::from(cfg.quantity),
    })
}

/// Volume-spike strategy: hold for one bar after an unusual-volume bar.
pub fn run_backtest(bars: &[Bar], cfg: &BacktestConfig) -> BacktestReport {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let vwap = volume_weighted_average_price(&closes, &volumes);
    let average_volume = rolling_average(&volumes, cfg.average_window);
    let unusual = unusual_volume(&volumes, &average_volume, cfg.spike_factor);

    let mut rows = Vec::with_capacity(bars.len());
    let mut market = 1.0;
    let mut strategy = 1.0;

    for (i, bar) in bars.iter().enumerate() {
        let signal = i > 0 && unusual[i - 1];
        let swing_buy = i > 0 && unusual[i - 1] && vwap[i - 1].is_some_and(|v| closes[i - 1] > v);

        let daily_return = if i > 0 && closes[i - 1] != 0.0 {
            Some(bar.close / closes[i - 1] - 1.0)
        } else {
            None
        };
        let strategy_return = daily_return.map(|r| if signal { r } else { 0.0 });

        if let Some(r) = daily_return {
            market *= 1.0 + r;
        }
        if let Some(r) = strategy_return {
            strategy *= 1.0 + r;
        }

        rows.push(BacktestRow {
            date: bar.date.clone(),
            close: bar.close,
            volume: bar.volume,
            vwap: vwap[i],
            average_volume: average_volume[i],
            unusual_volume: unusual[i],
            signal,
            swing_buy,
            daily_return,
            strategy_return,
            cumulative_market_return: market,
            cumulative_strategy_return: strategy,
        });
    }

    let total_trades = rows.iter().filter(|r| r.signal).count();
    let winning_trades = rows
        .iter()
        .filter(|r| r.strategy_return.is_some_and(|x| x > 0.0))
        .count();
    let losing_trades = rows
        .iter()
        .filter(|r| r.strategy_return.is_some_and(|x| x < 0.0))
        .count();
    let win_rate = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64
    } else {
        0.0
    };

    let holding_period =
        predict_holding_period(&rows, cfg.holding_target_pct, cfg.default_holding_period);
    let latest_signal = latest_signal(&rows, cfg);

    let forecast = forecast_prices(&closes, cfg.forecast_periods, cfg.alpha, cfg.beta)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "skipping forecast");
            Vec::new()
        });

    BacktestReport {
        rows,
        total_trades,
        winning_trades,
        losing_trades,
        win_rate,
        holding_period,
        latest_signal,
        forecast,
    }
}

/// Equal split of capital across symbols
pub fn allocation_per_symbol(capital: f64, symbols: usize) -> Option<f64> {
    if symbols == 0 {
        None
    } else {
        Some(capital / symbols as f64)
    }
}
