use crate::nse::config;
use crate::nse::models::Instrument;
use crate::screener::BacktestConfig;
use crate::signals::SignalConfig;
use anyhow::{bail, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Poll,
    Once,
    Replay,
    Screener,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll" => Ok(Self::Poll),
            "once" => Ok(Self::Once),
            "replay" => Ok(Self::Replay),
            "screener" => Ok(Self::Screener),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Poll => "poll",
            Self::Once => "once",
            Self::Replay => "replay",
            Self::Screener => "screener",
        };
        f.write_str(name)
    }
}

/// Application configuration handler
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Raw `NSE_MODE`; parsed by `execution_mode`
    pub mode: String,
    pub symbol: String,
    pub expiry: Option<String>,
    pub refresh_interval: Duration,
    pub max_cycles: Option<usize>,
    pub top_n: usize,
    pub history_file: PathBuf,
    pub bars_files: Vec<PathBuf>,
    pub capital: f64,
    pub paper_quantity: Option<u32>,
    pub signal: SignalConfig,
    pub backtest: BacktestConfig,
}

impl AppConfig {
    /// Create new configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            mode: config::get_execution_mode(),
            symbol: config::get_symbol(),
            expiry: config::get_expiry(),
            refresh_interval: config::get_refresh_interval(),
            max_cycles: config::get_max_cycles(),
            top_n: config::get_top_n(),
            history_file: PathBuf::from(config::get_history_file()),
            bars_files: config::get_bars_files().into_iter().map(PathBuf::from).collect(),
            capital: config::get_capital(),
            paper_quantity: config::get_paper_quantity(),
            signal: SignalConfig::from_env(),
            backtest: BacktestConfig::default(),
        }
    }

    pub fn execution_mode(&self) -> Result<ExecutionMode> {
        self.mode.parse().map_err(anyhow::Error::msg)
    }

    pub fn instrument(&self) -> Result<Instrument> {
        self.symbol.parse().map_err(anyhow::Error::msg)
    }

    /// Print the settings that matter for the chosen mode
    pub fn log_config(&self) {
        println!("{} Mode: {}", "→".cyan(), self.mode.yellow());
        match self.execution_mode() {
            Ok(ExecutionMode::Poll) | Ok(ExecutionMode::Once) => {
                println!("{} Symbol: {}", "→".cyan(), self.symbol.yellow());
                match &self.expiry {
                    Some(expiry) => println!("{} Expiry: {}", "→".cyan(), expiry.yellow()),
                    None => println!("{} Expiry: {}", "→".cyan(), "nearest".yellow()),
                }
                println!("{} Refresh: {}s", "→".cyan(), self.refresh_interval.as_secs());
                println!("{} History file: {}", "→".cyan(), self.history_file.display());
            }
            Ok(ExecutionMode::Replay) => {
                println!("{} History file: {}", "→".cyan(), self.history_file.display());
            }
            Ok(ExecutionMode::Screener) => {
                println!("{} Bar files: {}", "→".cyan(), self.bars_files.len());
                println!("{} Capital: Rs {:.2}", "→".cyan(), self.capital);
            }
            Err(_) => {}
        }
        println!();
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mode = self.execution_mode()?;

        if matches!(mode, ExecutionMode::Poll | ExecutionMode::Once) {
            self.instrument()?;
        }
        if mode == ExecutionMode::Screener && self.bars_files.is_empty() {
            bail!("NSE_BARS_FILE names no files");
        }
        if self.capital <= 0.0 {
            bail!("NSE_CAPITAL must be positive, got {}", self.capital);
        }
        if self.signal.ratio_threshold <= 0.0 {
            bail!("NSE_RATIO_THRESHOLD must be positive, got {}", self.signal.ratio_threshold);
        }
        Ok(())
    }
}
