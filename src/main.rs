use anyhow::Result;
use colored::Colorize;
use nse_oi_signals::nse::NseCommands;
use nse_oi_signals::{logging, AccumulatorState, AppConfig, ExecutionMode};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init_logging()?;

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        print_usage(&config.mode);
        return Err(e);
    }

    let mode = config.execution_mode()?;
    info!(mode = %mode, "starting");

    // Session state lives for the whole process and is handed to each cycle
    let mut state = AccumulatorState::new();

    match mode {
        ExecutionMode::Poll => NseCommands::run_poll(&config, &mut state).await,
        ExecutionMode::Once => NseCommands::run_once(&config, &mut state).await,
        ExecutionMode::Replay => NseCommands::run_replay(&config),
        ExecutionMode::Screener => NseCommands::run_screener(&config),
    }
}

fn print_usage(mode: &str) {
    println!("{} Configuration rejected (NSE_MODE={})", "✗".red(), mode.yellow());
    println!("Available modes:");
    println!("  {} - refresh every NSE_REFRESH_SECS until Ctrl-C", "poll".green());
    println!("  {} - fetch and label a single snapshot", "once".green());
    println!("  {} - summarise NSE_HISTORY_FILE", "replay".green());
    println!("  {} - volume-spike backtest over NSE_BARS_FILE", "screener".green());
    println!();
    println!("Usage: NSE_MODE=<mode> NSE_SYMBOL=<NIFTY|BANKNIFTY|FINNIFTY> nse-oi-signals");
}
