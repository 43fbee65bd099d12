use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

// -----------------------------------------------
// NSE API ENDPOINTS
// -----------------------------------------------
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";
pub const NSE_API_ALL_INDICES: &str = "https://www.nseindia.com/api/allIndices";

pub fn nse_contract_info_url(symbol: &str) -> String {
    format!(
        "{}/api/option-chain-contract-info?symbol={}",
        NSE_BASE_URL,
        urlencoding::encode(symbol)
    )
}

pub fn nse_option_chain_url(symbol: &str, expiry: &str) -> String {
    format!(
        "{}/api/option-chain-v3?type=Indices&symbol={}&expiry={}",
        NSE_BASE_URL,
        urlencoding::encode(symbol),
        urlencoding::encode(expiry)
    )
}

// -----------------------------------------------
// HTTP CLIENT CONFIG
// -----------------------------------------------
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                               AppleWebKit/537.36 (KHTML, like Gecko) \
                               Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-IN,en;q=0.9",
];

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

// -----------------------------------------------
// SESSION WARMUP
// -----------------------------------------------
pub const WARMUP_DELAY_MS: u64 = 200;

// -----------------------------------------------
// RETRY CONFIG
// -----------------------------------------------
pub const RETRY_BASE_DELAY_MS: u64 = 100;
pub const RETRY_FACTOR: u64 = 2;
pub const RETRY_MAX_DELAY_SECS: u64 = 3;
pub const RETRY_MAX_ATTEMPTS: usize = 3;

// -----------------------------------------------
// HTTP HEADERS
// -----------------------------------------------
pub const HEADER_REFERER: &str = "https://www.nseindia.com/";
pub const HEADER_X_REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HEADER_ACCEPT_HTML: &str = "text/html";

// -----------------------------------------------
// MARKET CLOCK
// -----------------------------------------------
/// IST is UTC+05:30
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;
pub const MARKET_CLOSE_HOUR: u32 = 15;
pub const MARKET_CLOSE_MINUTE: u32 = 30;
pub const EXPIRY_DATE_FORMAT: &str = "%d-%b-%Y";

// -----------------------------------------------
// POLL LOOP DEFAULTS
// -----------------------------------------------
pub const DEFAULT_REFRESH_SECS: u64 = 180;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_HISTORY_FILE: &str = "signal_history.csv";
pub const DEFAULT_BARS_FILE: &str = "bars.csv";
pub const ATM_SPAN: usize = 5;
pub const DEFAULT_CAPITAL: f64 = 20_000.0;

// -----------------------------------------------
// RUNTIME CONFIGURATION
// -----------------------------------------------

/// Read an environment variable and parse it, keeping the default on
/// absence or parse failure.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparseable environment value");
                default
            }
        },
        Err(_) => default,
    }
}

/// Get the execution mode from environment or default to poll
pub fn get_execution_mode() -> String {
    std::env::var("NSE_MODE").unwrap_or_else(|_| "poll".to_string())
}

/// Instrument symbol (NIFTY, BANKNIFTY, FINNIFTY)
pub fn get_symbol() -> String {
    std::env::var("NSE_SYMBOL").unwrap_or_else(|_| "NIFTY".to_string())
}

/// Fixed expiry; `None` means pick the nearest live expiry each cycle
pub fn get_expiry() -> Option<String> {
    std::env::var("NSE_EXPIRY")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_refresh_interval() -> Duration {
    Duration::from_secs(env_or("NSE_REFRESH_SECS", DEFAULT_REFRESH_SECS).max(1))
}

pub fn get_max_cycles() -> Option<usize> {
    std::env::var("NSE_MAX_CYCLES")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
}

pub fn get_top_n() -> usize {
    env_or("NSE_TOP_N", DEFAULT_TOP_N).max(1)
}

pub fn get_history_file() -> String {
    std::env::var("NSE_HISTORY_FILE").unwrap_or_else(|_| DEFAULT_HISTORY_FILE.to_string())
}

/// Comma-separated list of bar files, one per screened symbol
pub fn get_bars_files() -> Vec<String> {
    let raw = std::env::var("NSE_BARS_FILE").unwrap_or_else(|_| DEFAULT_BARS_FILE.to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn get_capital() -> f64 {
    env_or("NSE_CAPITAL", DEFAULT_CAPITAL)
}

/// Paper-trade quantity per cycle; unset or 0 disables paper trading
pub fn get_paper_quantity() -> Option<u32> {
    Some(env_or("NSE_PAPER_QTY", 0u32)).filter(|q| *q > 0)
}

pub fn get_signal_preset() -> String {
    std::env::var("NSE_SIGNAL_PRESET").unwrap_or_else(|_| "canonical".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_chain_url_encodes_expiry() {
        let url = nse_option_chain_url("NIFTY", "30 Dec 2025");
        assert_eq!(
            url,
            "https://www.nseindia.com/api/option-chain-v3?type=Indices&symbol=NIFTY&expiry=30%20Dec%202025"
        );
    }

    #[test]
    fn test_env_or_falls_back_on_missing_key() {
        assert_eq!(env_or("NSE_TEST_SURELY_UNSET_KEY", 42usize), 42);
    }
}
