use super::metrics::percentage_oi_change;
use super::processor::{MarketContext, OptionSnapshotRow};
use crate::error::IngestError;
use crate::nse::config::env_or;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading label emitted per strike
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalLabel {
    BuyCall,
    BuyPut,
    Hold,
    StrongBuyCall,
    StrongBuyPut,
    SellCall,
    SellPut,
}

impl SignalLabel {
    pub const ALL: [SignalLabel; 7] = [
        SignalLabel::BuyCall,
        SignalLabel::BuyPut,
        SignalLabel::Hold,
        SignalLabel::StrongBuyCall,
        SignalLabel::StrongBuyPut,
        SignalLabel::SellCall,
        SignalLabel::SellPut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalLabel::BuyCall => "BUY CE",
            SignalLabel::BuyPut => "BUY PE",
            SignalLabel::Hold => "HOLD",
            SignalLabel::StrongBuyCall => "STRONG BUY CE",
            SignalLabel::StrongBuyPut => "STRONG BUY PE",
            SignalLabel::SellCall => "SELL CE",
            SignalLabel::SellPut => "SELL PE",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            SignalLabel::BuyCall
                | SignalLabel::BuyPut
                | SignalLabel::StrongBuyCall
                | SignalLabel::StrongBuyPut
        )
    }

    /// Call-side label for a put-side one and vice versa
    pub fn mirrored(&self) -> Self {
        match self {
            SignalLabel::BuyCall => SignalLabel::BuyPut,
            SignalLabel::BuyPut => SignalLabel::BuyCall,
            SignalLabel::StrongBuyCall => SignalLabel::StrongBuyPut,
            SignalLabel::StrongBuyPut => SignalLabel::StrongBuyCall,
            SignalLabel::SellCall => SignalLabel::SellPut,
            SignalLabel::SellPut => SignalLabel::SellCall,
            SignalLabel::Hold => SignalLabel::Hold,
        }
    }
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalLabel {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SignalLabel::ALL
            .into_iter()
            .find(|l| l.as_str() == trimmed)
            .ok_or_else(|| IngestError::UnknownLabel(trimmed.to_string()))
    }
}

impl Serialize for SignalLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignalLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What moves a row off HOLD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// One side's OI change outgrows the other's by `ratio_threshold`
    OiChangeRatio,
    /// Percentage OI changes diverge by at least `min_change_percent`
    PercentChange,
}

/// PCR confirmation: bullish only below, bearish only above
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PcrGate {
    pub bullish_below: f64,
    pub bearish_above: f64,
}

/// Threshold knobs for the labeling rule. Every variant of the rule is one
/// of these records; see the presets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub trigger: Trigger,
    pub ratio_threshold: f64,
    pub min_change_percent: f64,
    pub volume_threshold: f64,
    pub iv_threshold: f64,
    /// Upgrade BUY to STRONG BUY on volume and IV, or drop to HOLD
    pub enhanced: bool,
    pub pcr_gate: Option<PcrGate>,
}

impl SignalConfig {
    /// Put vs call OI change with a 2x ratio
    pub fn canonical() -> Self {
        Self {
            trigger: Trigger::OiChangeRatio,
            ratio_threshold: 2.0,
            min_change_percent: 5.0,
            volume_threshold: 1000.0,
            iv_threshold: 20.0,
            enhanced: false,
            pcr_gate: None,
        }
    }

    pub fn enhanced() -> Self {
        Self {
            enhanced: true,
            ..Self::canonical()
        }
    }

    /// Percentage OI change, 5% each way
    pub fn intraday() -> Self {
        Self {
            trigger: Trigger::PercentChange,
            ..Self::canonical()
        }
    }

    pub fn pcr_gated() -> Self {
        Self {
            pcr_gate: Some(PcrGate {
                bullish_below: 0.7,
                bearish_above: 1.2,
            }),
            ..Self::canonical()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "canonical" => Some(Self::canonical()),
            "enhanced" => Some(Self::enhanced()),
            "intraday" => Some(Self::intraday()),
            "pcr-gated" | "pcr_gated" | "pcr" => Some(Self::pcr_gated()),
            _ => None,
        }
    }

    /// Preset named by `NSE_SIGNAL_PRESET` with per-knob env overrides
    pub fn from_env() -> Self {
        let name = crate::nse::config::get_signal_preset();
        let base = Self::preset(&name).unwrap_or_else(|| {
            tracing::warn!(preset = %name, "unknown signal preset, using canonical");
            Self::canonical()
        });

        let pcr_gate = base.pcr_gate.map(|g| PcrGate {
            bullish_below: env_or("NSE_PCR_BULLISH_BELOW", g.bullish_below),
            bearish_above: env_or("NSE_PCR_BEARISH_ABOVE", g.bearish_above),
        });

        Self {
            ratio_threshold: env_or("NSE_RATIO_THRESHOLD", base.ratio_threshold),
            min_change_percent: env_or("NSE_MIN_CHANGE_PCT", base.min_change_percent),
            volume_threshold: env_or("NSE_VOLUME_THRESHOLD", base.volume_threshold),
            iv_threshold: env_or("NSE_IV_THRESHOLD", base.iv_threshold),
            pcr_gate,
            ..base
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Label one strike. Pure and total: every input maps to exactly one label.
pub fn signal_label(row: &OptionSnapshotRow, ctx: &MarketContext, cfg: &SignalConfig) -> SignalLabel {
    let (mut bullish, mut bearish) = match cfg.trigger {
        Trigger::OiChangeRatio => (
            row.put_oi_change > row.call_oi_change * cfg.ratio_threshold,
            row.call_oi_change > row.put_oi_change * cfg.ratio_threshold,
        ),
        Trigger::PercentChange => {
            let call_pct = percentage_oi_change(row.call_oi_change, row.call_open_interest);
            let put_pct = percentage_oi_change(row.put_oi_change, row.put_open_interest);
            let (Some(call_pct), Some(put_pct)) = (call_pct, put_pct) else {
                return SignalLabel::Hold;
            };
            let min = cfg.min_change_percent;
            (
                put_pct > min && call_pct < -min,
                call_pct > min && put_pct < -min,
            )
        }
    };

    if let Some(gate) = cfg.pcr_gate {
        bullish = bullish && ctx.put_call_ratio.is_some_and(|pcr| pcr < gate.bullish_below);
        bearish = bearish && ctx.put_call_ratio.is_some_and(|pcr| pcr > gate.bearish_above);
    }

    // Contradictory pressure on both sides is no signal
    let label = match (bullish, bearish) {
        (true, false) => SignalLabel::BuyCall,
        (false, true) => SignalLabel::BuyPut,
        _ => SignalLabel::Hold,
    };

    if !cfg.enhanced || label == SignalLabel::Hold {
        return label;
    }

    let confirmed = row.volume > cfg.volume_threshold && row.implied_volatility > cfg.iv_threshold;
    match (label, confirmed) {
        (SignalLabel::BuyCall, true) => SignalLabel::StrongBuyCall,
        (SignalLabel::BuyPut, true) => SignalLabel::StrongBuyPut,
        _ => SignalLabel::Hold,
    }
}

/// Label every row of a cycle
pub fn label_rows(
    rows: &[OptionSnapshotRow],
    ctx: &MarketContext,
    cfg: &SignalConfig,
) -> Vec<(OptionSnapshotRow, SignalLabel)> {
    rows.iter()
        .map(|row| (row.clone(), signal_label(row, ctx, cfg)))
        .collect()
}
