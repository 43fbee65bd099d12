use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Index instrument classes with a live option chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Nifty,
    BankNifty,
    FinNifty,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Nifty, Instrument::BankNifty, Instrument::FinNifty];

    /// Symbol used by the option-chain endpoints
    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::Nifty => "NIFTY",
            Instrument::BankNifty => "BANKNIFTY",
            Instrument::FinNifty => "FINNIFTY",
        }
    }

    /// Name of the index on the all-indices feed
    pub fn spot_index_name(&self) -> &'static str {
        match self {
            Instrument::Nifty => "NIFTY 50",
            Instrument::BankNifty => "NIFTY BANK",
            Instrument::FinNifty => "NIFTY FINANCIAL SERVICES",
        }
    }

    /// Strike rounding granularity in index points
    pub fn strike_step(&self) -> f64 {
        match self {
            Instrument::Nifty => 50.0,
            Instrument::BankNifty => 100.0,
            Instrument::FinNifty => 50.0,
        }
    }

    /// Half-width of the strike window around the rounded spot
    pub fn window_half_width(&self) -> f64 {
        match self {
            Instrument::Nifty => 1000.0,
            Instrument::BankNifty => 1500.0,
            Instrument::FinNifty => 900.0,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Instrument::ALL
            .into_iter()
            .find(|i| i.symbol() == wanted)
            .ok_or_else(|| format!("unsupported instrument '{}' (use NIFTY, BANKNIFTY or FINNIFTY)", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInfo {
    #[serde(rename = "expiryDates")]
    pub expiry_dates: Vec<String>,
}

/// Main response structure from NSE option chain API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub records: Records,
    pub filtered: FilteredData,
}

/// Records section containing timestamp and underlying value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Records {
    pub timestamp: String,

    #[serde(rename = "underlyingValue")]
    pub underlying_value: f64,
}

/// Filtered section containing the selected expiry's strikes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredData {
    pub data: Vec<OptionData>,
}

/// Option data for each strike price
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionData {
    #[serde(rename = "strikePrice")]
    pub strike_price: Option<f64>,

    #[serde(rename = "CE")]
    pub call: Option<OptionDetail>,

    #[serde(rename = "PE")]
    pub put: Option<OptionDetail>,
}

/// Detailed option information (CE or PE)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionDetail {
    #[serde(rename = "openInterest")]
    pub open_interest: Option<f64>,

    #[serde(rename = "changeinOpenInterest")]
    pub change_in_oi: Option<f64>,

    #[serde(rename = "lastPrice")]
    pub last_price: Option<f64>,

    #[serde(rename = "totalTradedVolume", default)]
    pub total_traded_volume: Option<f64>,

    #[serde(rename = "impliedVolatility", default)]
    pub implied_volatility: Option<f64>,
}

/// All-indices market watch response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllIndices {
    pub data: Vec<IndexQuote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexQuote {
    pub index: String,
    pub last: f64,
}

impl AllIndices {
    pub fn last_for(&self, index_name: &str) -> Option<f64> {
        self.data
            .iter()
            .find(|q| q.index == index_name)
            .map(|q| q.last)
    }
}
