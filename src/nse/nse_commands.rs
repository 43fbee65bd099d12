use super::models::{Instrument, OptionChain};
use super::nse_client::{ist_now, NseClient};
use crate::app_config::AppConfig;
use crate::error::IngestError;
use crate::screener::{allocation_per_symbol, read_bars, run_backtest, BacktestReport};
use crate::signals::{
    atm_neighbourhood, ingest_chain, label_rows, read_history, signal_counts, top_by_oi_change,
    AccumulatorState, MarketContext, OptionSnapshotRow, SignalLabel, StrikeWindow, Trade,
};
use crate::utility::{timed_async, CycleStats, Timer};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use colored::{ColoredString, Colorize};
use std::fs::File;
use std::future::Future;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Outcome of one refresh cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub instrument: Instrument,
    pub expiry: String,
    pub timestamp: String,
    pub context: MarketContext,
    pub window: StrikeWindow,
    /// Labeled rows inside the strike window, in chain order
    pub labeled: Vec<(OptionSnapshotRow, SignalLabel)>,
    pub appended: usize,
    pub paper_trade: Option<Trade>,
    /// History file was rewritten after this cycle
    pub exported: bool,
}

impl CycleReport {
    pub fn label_count(&self, label: SignalLabel) -> usize {
        self.labeled.iter().filter(|(_, l)| *l == label).count()
    }
}

/// Turn one fetched chain into labeled rows and append them to `state`.
///
/// `spot` is the all-indices quote; when absent the chain's underlying
/// value stands in for it.
pub fn process_snapshot(
    chain: &OptionChain,
    spot: Option<f64>,
    instrument: Instrument,
    expiry: &str,
    cfg: &AppConfig,
    state: &mut AccumulatorState,
    captured_at: DateTime<FixedOffset>,
) -> Result<CycleReport, IngestError> {
    let spot_price = spot.unwrap_or_else(|| {
        warn!(
            instrument = %instrument,
            underlying = chain.records.underlying_value,
            "no spot quote on all-indices feed, using chain underlying value"
        );
        chain.records.underlying_value
    });

    let rows = ingest_chain(chain)?;
    let context = MarketContext::from_rows(spot_price, &rows);

    let window = StrikeWindow::around(spot_price, instrument);
    let in_window = window.filter(&rows);
    if in_window.is_empty() {
        warn!(lower = window.lower, upper = window.upper, "no strikes inside window");
    }

    let labeled = label_rows(&in_window, &context, &cfg.signal);
    let appended = state.record_cycle(&labeled, captured_at, cfg.top_n);

    // Paper trade the strongest buy of the cycle
    let mut paper_trade = None;
    if let Some(quantity) = cfg.paper_quantity {
        let top = top_by_oi_change(&labeled, cfg.top_n, |(row, _)| row);
        if let Some(label) = top.iter().map(|(_, l)| *l).find(SignalLabel::is_buy) {
            paper_trade = state
                .portfolio_mut()
                .execute_signal(label, &top, quantity)
                .cloned();
        }
    }

    Ok(CycleReport {
        instrument,
        expiry: expiry.to_string(),
        timestamp: chain.records.timestamp.clone(),
        context,
        window,
        labeled,
        appended,
        paper_trade,
        exported: false,
    })
}

/// `process_snapshot` followed by a rewrite of the history file.
///
/// A failed write is logged and reported through `exported`; the cycle
/// still counts and the next successful export rewrites the whole history.
pub fn process_and_export(
    chain: &OptionChain,
    spot: Option<f64>,
    instrument: Instrument,
    expiry: &str,
    cfg: &AppConfig,
    state: &mut AccumulatorState,
    captured_at: DateTime<FixedOffset>,
) -> Result<CycleReport, IngestError> {
    let mut report = process_snapshot(chain, spot, instrument, expiry, cfg, state, captured_at)?;

    match state.save_csv(&cfg.history_file) {
        Ok(()) => report.exported = true,
        Err(e) => warn!(
            file = %cfg.history_file.display(),
            error = %e,
            "history export failed, keeping rows in memory"
        ),
    }

    Ok(report)
}

/// NSE Command Handler - encapsulates the execution modes
pub struct NseCommands;

impl NseCommands {
    /// Refresh on a fixed interval until Ctrl-C or the cycle limit.
    /// Cycles never overlap: the next sleep starts after the previous
    /// cycle has finished.
    pub async fn run_poll(cfg: &AppConfig, state: &mut AccumulatorState) -> Result<()> {
        Self::banner("NSE OI Signal Monitor");
        cfg.log_config();

        let client = NseClient::new().context("building NSE client")?;
        let mut stats = CycleStats::new();

        let mut shutdown = Self::shutdown_listener(tokio::signal::ctrl_c());
        // Let the listener register its handler before cycle 1 starts
        tokio::task::yield_now().await;

        let mut cycle = 0usize;
        loop {
            cycle += 1;
            let timer = Timer::start(format!("Cycle {}", cycle));

            let result = Self::run_cycle(&client, cfg, state).await;
            let ok = result.is_ok();
            match result {
                Ok(report) => Self::display_cycle(&report, state),
                Err(e) => {
                    error!(cycle, error = %format!("{:#}", e), "refresh cycle failed");
                    println!(
                        "{} Could not refresh data this cycle; retrying in {}s",
                        "⚠".yellow(),
                        cfg.refresh_interval.as_secs()
                    );
                }
            }
            stats.record(timer.stop(), ok);

            if cfg.max_cycles.is_some_and(|max| cycle >= max) {
                info!(cycles = cycle, "cycle limit reached");
                break;
            }

            tokio::select! {
                Ok(()) = shutdown.changed() => {
                    info!("ctrl-c received, stopping poll loop");
                    println!("\n{} Stopping after {} cycles", "ℹ".blue(), cycle);
                    break;
                }
                _ = tokio::time::sleep(cfg.refresh_interval) => {}
            }
        }

        stats.summary();
        Ok(())
    }

    /// Watch `signal` on its own task; the flag flips once it resolves.
    /// If the handler cannot be installed the sender is dropped and the
    /// receiver never reports a change.
    fn shutdown_listener<F>(signal: F) -> watch::Receiver<bool>
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            match signal.await {
                Ok(()) => {
                    let _ = tx.send(true);
                }
                Err(e) => error!(error = %e, "could not listen for ctrl-c"),
            }
        });
        rx
    }

    /// Run a single cycle; fails if the cycle fails
    pub async fn run_once(cfg: &AppConfig, state: &mut AccumulatorState) -> Result<()> {
        Self::banner("NSE OI Signal Snapshot");
        cfg.log_config();

        let client = NseClient::new().context("building NSE client")?;
        let timer = Timer::start("Snapshot");
        let report = Self::run_cycle(&client, cfg, state).await?;
        timer.stop();

        Self::display_cycle(&report, state);
        Ok(())
    }

    /// Fetch, label, record and export one snapshot
    pub async fn run_cycle(
        client: &NseClient,
        cfg: &AppConfig,
        state: &mut AccumulatorState,
    ) -> Result<CycleReport> {
        let instrument = cfg.instrument()?;

        let expiry = match &cfg.expiry {
            Some(expiry) => expiry.clone(),
            None => client
                .fetch_nearest_expiry(instrument)
                .await
                .context("resolving nearest expiry")?,
        };

        let chain = timed_async("Option chain fetch", || client.fetch_option_chain(instrument, &expiry))
            .await
            .with_context(|| format!("fetching option chain for {} {}", instrument, expiry))?;

        // Falls back to the chain underlying value
        let spot = match client.fetch_spot_price(instrument).await {
            Ok(spot) => spot,
            Err(e) => {
                warn!(error = %e, "spot price fetch failed");
                None
            }
        };

        let report = process_and_export(&chain, spot, instrument, &expiry, cfg, state, ist_now())
            .context("ingesting option chain")?;

        info!(
            instrument = %instrument,
            expiry = %report.expiry,
            strikes = report.labeled.len(),
            appended = report.appended,
            history = state.len(),
            exported = report.exported,
            "cycle complete"
        );

        Ok(report)
    }

    /// Summarise a previously exported history file
    pub fn run_replay(cfg: &AppConfig) -> Result<()> {
        Self::banner("Signal History Replay");
        cfg.log_config();

        let file = File::open(&cfg.history_file)
            .with_context(|| format!("opening {}", cfg.history_file.display()))?;
        let records = read_history(file).context("reading signal history")?;
        let counts = signal_counts(&records);

        println!("{} Records: {}", "✓".green(), records.len());
        println!("{} Strikes: {}", "✓".green(), counts.len());
        println!();

        for (strike, by_label) in &counts {
            let parts: Vec<String> = by_label
                .iter()
                .map(|(label, n)| format!("{} x{}", Self::paint(*label), n))
                .collect();
            println!("  {:>10.2}  {}", strike, parts.join("  "));
        }

        println!();
        Ok(())
    }

    /// Volume-spike backtest for every configured bar file
    pub fn run_screener(cfg: &AppConfig) -> Result<()> {
        Self::banner("Volume Spike Screener");
        cfg.log_config();

        let per_symbol = allocation_per_symbol(cfg.capital, cfg.bars_files.len());
        if let Some(amount) = per_symbol {
            println!("{} Investment per symbol: Rs {:.2}", "ℹ".blue(), amount);
            println!();
        }

        let mut failed = Vec::new();
        for path in &cfg.bars_files {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let bars = File::open(path)
                .with_context(|| format!("opening {}", path.display()))
                .and_then(|file| read_bars(file).context("reading bars"));

            match bars {
                Ok(bars) => {
                    let report = run_backtest(&bars, &cfg.backtest);
                    Self::display_backtest(&name, &report);
                }
                Err(e) => {
                    error!(file = %path.display(), error = %format!("{:#}", e), "screener input failed");
                    failed.push((name, format!("{:#}", e)));
                }
            }
        }

        if !failed.is_empty() {
            println!("{}", "Failed Inputs:".red());
            for (name, error) in &failed {
                println!("  {} {} → {}", "✗".red(), name.yellow(), error.chars().take(80).collect::<String>());
            }
            println!();
        }

        Ok(())
    }

    fn banner(title: &str) {
        println!("{}", "=".repeat(60).blue());
        println!("{}", title.green().bold());
        println!("{}", "=".repeat(60).blue());
        println!();
    }

    fn paint(label: SignalLabel) -> ColoredString {
        match label {
            SignalLabel::BuyCall | SignalLabel::StrongBuyCall => label.as_str().green(),
            SignalLabel::BuyPut | SignalLabel::StrongBuyPut => label.as_str().red(),
            SignalLabel::SellCall | SignalLabel::SellPut => label.as_str().yellow(),
            SignalLabel::Hold => label.as_str().normal(),
        }
    }

    /// Display one refresh cycle
    fn display_cycle(report: &CycleReport, state: &AccumulatorState) {
        println!("{}", "=".repeat(60).blue());
        println!("{}", "Results".cyan().bold());
        println!("{}", "=".repeat(60).blue());
        println!("{} Symbol: {}", "✓".green(), report.instrument.symbol().yellow());
        println!("{} Expiry: {}", "✓".green(), report.expiry);
        println!("{} Timestamp: {}", "✓".green(), report.timestamp);
        println!("{} Spot: {:.2}", "✓".green(), report.context.spot_price);
        match report.context.put_call_ratio {
            Some(pcr) => println!("{} PCR: {:.2}", "✓".green(), pcr),
            None => println!("{} PCR: {}", "✓".green(), "n/a".yellow()),
        }
        println!(
            "{} Window: {:.0} - {:.0} ({} strikes)",
            "✓".green(),
            report.window.lower,
            report.window.upper,
            report.labeled.len()
        );
        println!(
            "{} BUY CE: {}  BUY PE: {}  HOLD: {}",
            "ℹ".blue(),
            report.label_count(SignalLabel::BuyCall) + report.label_count(SignalLabel::StrongBuyCall),
            report.label_count(SignalLabel::BuyPut) + report.label_count(SignalLabel::StrongBuyPut),
            report.label_count(SignalLabel::Hold)
        );
        println!();

        let rows: Vec<OptionSnapshotRow> = report.labeled.iter().map(|(r, _)| r.clone()).collect();
        let near = atm_neighbourhood(&rows, report.context.spot_price, crate::nse::config::ATM_SPAN);
        if !near.is_empty() {
            println!("{}", "Near the money:".cyan());
            println!(
                "  {:>9} {:>12} {:>10} {:>12} {:>10}  {}",
                "Strike", "CE OI", "CE ΔOI", "PE OI", "PE ΔOI", "Signal"
            );
            for row in &near {
                let label = report
                    .labeled
                    .iter()
                    .find(|(r, _)| r.strike == row.strike)
                    .map(|(_, l)| *l)
                    .unwrap_or(SignalLabel::Hold);
                println!(
                    "  {:>9.0} {:>12.0} {:>10.0} {:>12.0} {:>10.0}  {}",
                    row.strike,
                    row.call_open_interest,
                    row.call_oi_change,
                    row.put_open_interest,
                    row.put_oi_change,
                    Self::paint(label)
                );
            }
            println!();
        }

        println!(
            "{} History: {} entries ({} buy signals, {} captures)",
            "ℹ".blue(),
            state.len(),
            state.buy_signals().count(),
            state.capture_times().len()
        );

        if !report.exported {
            println!("{} History file not written this cycle", "⚠".yellow());
        }

        if let Some(trade) = &report.paper_trade {
            println!(
                "{} Paper trade: BUY {} {:.0} x{} @ {:.2}",
                "→".cyan(),
                trade.side.as_str(),
                trade.strike,
                trade.quantity,
                trade.entry_price
            );
        }
        if !state.portfolio().trades().is_empty() {
            println!(
                "{} Portfolio P&L: {:.2}",
                "ℹ".blue(),
                state.portfolio().mark_to_market(&rows)
            );
        }
        println!();
    }

    /// Display backtest metrics for one symbol
    fn display_backtest(name: &str, report: &BacktestReport) {
        println!("{}", "=".repeat(60).blue());
        println!("{}", name.cyan().bold());
        println!("{}", "=".repeat(60).blue());
        println!("{} Bars: {}", "✓".green(), report.rows.len());
        println!("{} Total trades: {}", "✓".green(), report.total_trades);
        println!("{} Winning trades: {}", "✓".green(), report.winning_trades);
        println!("{} Losing trades: {}", "✓".green(), report.losing_trades);
        println!("{} Win rate: {:.2}%", "✓".green(), report.win_rate * 100.0);

        if let Some(last) = report.rows.last() {
            println!(
                "{} Cumulative return: market {:.2}%, strategy {:.2}%",
                "ℹ".blue(),
                (last.cumulative_market_return - 1.0) * 100.0,
                (last.cumulative_strategy_return - 1.0) * 100.0
            );
        }

        let swings: Vec<String> = report
            .swing_buys()
            .map(|r| r.date.clone().unwrap_or_else(|| format!("{:.2}", r.close)))
            .collect();
        if !swings.is_empty() {
            println!("{} Swing buys: {}", "→".cyan(), swings.join(", "));
        }

        println!("{} Holding period: {} bars", "ℹ".blue(), report.holding_period);
        if let Some(signal) = &report.latest_signal {
            let achieved = if signal.target_achieved {
                "yes".green()
            } else {
                "no".yellow()
            };
            println!(
                "{} Last signal: {} buy {:.2}, target {:.2}, current {:.2} (achieved: {})",
                "→".cyan(),
                signal.date.as_deref().unwrap_or("n/a"),
                signal.buy_price,
                signal.holding_target,
                signal.current_price,
                achieved
            );
            println!(
                "{} P&L on {} shares: {:.2}",
                "ℹ".blue(),
                signal.quantity,
                signal.profit_loss
            );
        }

        if !report.forecast.is_empty() {
            let values: Vec<String> = report.forecast.iter().map(|v| format!("{:.2}", v)).collect();
            println!("{} Forecast: {}", "→".cyan(), values.join(", "));
        }
        println!();
    }
}
