use crate::error::IngestError;
use crate::nse::models::{Instrument, OptionChain, OptionData, OptionDetail};
use serde::{Deserialize, Serialize};

/// One strike of the option chain, resolved at the ingestion boundary.
///
/// `volume` and `implied_volatility` are not always published; they fall
/// back to 0 here so downstream code never checks for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSnapshotRow {
    pub strike: f64,
    pub call_open_interest: f64,
    pub call_oi_change: f64,
    pub call_last_price: f64,
    pub put_open_interest: f64,
    pub put_oi_change: f64,
    pub put_last_price: f64,
    pub volume: f64,
    pub implied_volatility: f64,
    pub timestamp: String,
}

impl OptionSnapshotRow {
    /// Row with the six core fields set and everything optional zeroed
    pub fn new(
        strike: f64,
        call: (f64, f64, f64),
        put: (f64, f64, f64),
    ) -> Self {
        Self {
            strike,
            call_open_interest: call.0,
            call_oi_change: call.1,
            call_last_price: call.2,
            put_open_interest: put.0,
            put_oi_change: put.1,
            put_last_price: put.2,
            volume: 0.0,
            implied_volatility: 0.0,
            timestamp: String::new(),
        }
    }

    /// Same strike with call and put sides exchanged
    pub fn mirrored(&self) -> Self {
        Self {
            call_open_interest: self.put_open_interest,
            call_oi_change: self.put_oi_change,
            call_last_price: self.put_last_price,
            put_open_interest: self.call_open_interest,
            put_oi_change: self.call_oi_change,
            put_last_price: self.call_last_price,
            ..self.clone()
        }
    }

    /// Ranking key for the history: |ΔOI CE| + |ΔOI PE|
    pub fn combined_oi_change(&self) -> f64 {
        self.call_oi_change.abs() + self.put_oi_change.abs()
    }
}

/// Aggregates derived once per fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub spot_price: f64,
    /// Σ put OI / Σ call OI; `None` when there is no call open interest
    pub put_call_ratio: Option<f64>,
}

impl MarketContext {
    pub fn from_rows(spot_price: f64, rows: &[OptionSnapshotRow]) -> Self {
        let call_oi: f64 = rows.iter().map(|r| r.call_open_interest).sum();
        let put_oi: f64 = rows.iter().map(|r| r.put_open_interest).sum();

        Self {
            spot_price,
            put_call_ratio: if call_oi > 0.0 { Some(put_oi / call_oi) } else { None },
        }
    }
}

/// Convert the wire chain into snapshot rows.
///
/// Absent CE/PE sides are zero-filled. A present side that lacks one of the
/// core fields fails the whole cycle.
pub fn ingest_chain(chain: &OptionChain) -> Result<Vec<OptionSnapshotRow>, IngestError> {
    ingest_strikes(&chain.filtered.data, &chain.records.timestamp)
}

pub fn ingest_strikes(
    data: &[OptionData],
    timestamp: &str,
) -> Result<Vec<OptionSnapshotRow>, IngestError> {
    if data.is_empty() {
        return Err(IngestError::EmptyChain);
    }

    data.iter()
        .enumerate()
        .map(|(index, opt)| {
            let strike = opt.strike_price.ok_or(IngestError::MissingStrike { index })?;
            let call = side_fields(opt.call.as_ref(), strike, "CE")?;
            let put = side_fields(opt.put.as_ref(), strike, "PE")?;

            let volume = side_volume(opt.call.as_ref()) + side_volume(opt.put.as_ref());

            let ivs: Vec<f64> = [opt.call.as_ref(), opt.put.as_ref()]
                .into_iter()
                .flatten()
                .filter_map(|d| d.implied_volatility)
                .filter(|iv| *iv > 0.0)
                .collect();
            let implied_volatility = if ivs.is_empty() {
                0.0
            } else {
                ivs.iter().sum::<f64>() / ivs.len() as f64
            };

            Ok(OptionSnapshotRow {
                strike,
                call_open_interest: call.0,
                call_oi_change: call.1,
                call_last_price: call.2,
                put_open_interest: put.0,
                put_oi_change: put.1,
                put_last_price: put.2,
                volume,
                implied_volatility,
                timestamp: timestamp.to_string(),
            })
        })
        .collect()
}

/// (open interest, change in OI, last price) for one side
fn side_fields(
    detail: Option<&OptionDetail>,
    strike: f64,
    side: &'static str,
) -> Result<(f64, f64, f64), IngestError> {
    let Some(d) = detail else {
        return Ok((0.0, 0.0, 0.0));
    };

    let require = |value: Option<f64>, field: &'static str| {
        value.ok_or(IngestError::MissingField { strike, side, field })
    };

    Ok((
        require(d.open_interest, "openInterest")?,
        require(d.change_in_oi, "changeinOpenInterest")?,
        require(d.last_price, "lastPrice")?,
    ))
}

fn side_volume(detail: Option<&OptionDetail>) -> f64 {
    detail.and_then(|d| d.total_traded_volume).unwrap_or(0.0)
}

/// Inclusive strike range centred on the rounded spot price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrikeWindow {
    pub anchor: f64,
    pub lower: f64,
    pub upper: f64,
}

impl StrikeWindow {
    pub fn around(spot: f64, instrument: Instrument) -> Self {
        Self::with_step(spot, instrument.strike_step(), instrument.window_half_width())
    }

    /// Anchor is the spot rounded half-to-even to a multiple of `step`
    pub fn with_step(spot: f64, step: f64, half_width: f64) -> Self {
        let anchor = (spot / step).round_ties_even() * step;
        Self {
            anchor,
            lower: anchor - half_width,
            upper: anchor + half_width,
        }
    }

    pub fn contains(&self, strike: f64) -> bool {
        strike >= self.lower && strike <= self.upper
    }

    pub fn filter(&self, rows: &[OptionSnapshotRow]) -> Vec<OptionSnapshotRow> {
        rows.iter().filter(|r| self.contains(r.strike)).cloned().collect()
    }
}

/// Find ATM strike (closest to spot, prefer floor)
pub fn find_atm_strike(rows: &[OptionSnapshotRow], spot: f64) -> Option<f64> {
    let mut closest: Option<(f64, f64)> = None;

    for row in rows {
        let distance = (row.strike - spot).abs();
        closest = match closest {
            Some((best, best_distance))
                if best_distance < distance || (best_distance == distance && best <= row.strike) =>
            {
                Some((best, best_distance))
            }
            _ => Some((row.strike, distance)),
        };
    }

    closest.map(|(strike, _)| strike)
}

/// ATM strike plus up to `span` strikes either side, sorted by strike
pub fn atm_neighbourhood(rows: &[OptionSnapshotRow], spot: f64, span: usize) -> Vec<OptionSnapshotRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| a.strike.total_cmp(&b.strike));

    let Some(atm) = find_atm_strike(&sorted, spot) else {
        return Vec::new();
    };
    let Some(atm_index) = sorted.iter().position(|r| r.strike == atm) else {
        return Vec::new();
    };

    let start = atm_index.saturating_sub(span);
    let end = (atm_index + span + 1).min(sorted.len());
    sorted[start..end].to_vec()
}

/// Rows ordered by combined absolute OI change, largest first; ties keep
/// their input order.
pub fn top_by_oi_change<T, F>(items: &[T], n: usize, row_of: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &OptionSnapshotRow,
{
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| {
        row_of(b)
            .combined_oi_change()
            .total_cmp(&row_of(a).combined_oi_change())
    });
    sorted.truncate(n);
    sorted
}
