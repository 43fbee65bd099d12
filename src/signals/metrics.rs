//! Derived metrics consumed by the labeler and the screener.
//!
//! Undefined results are `None`, never NaN or infinity.

/// Running VWAP: cumulative price*volume over cumulative volume.
///
/// Positions where the cumulative volume is still zero are `None`.
/// Output length is the shorter of the two inputs.
pub fn volume_weighted_average_price(prices: &[f64], volumes: &[f64]) -> Vec<Option<f64>> {
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;

    prices
        .iter()
        .zip(volumes)
        .map(|(&p, &v)| {
            cum_pv += p * v;
            cum_vol += v;
            if cum_vol > 0.0 { Some(cum_pv / cum_vol) } else { None }
        })
        .collect()
}

/// Trailing simple moving average; the first `window - 1` positions are `None`.
pub fn simple_moving_average(series: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; series.len()];
    }

    let mut out = Vec::with_capacity(series.len());
    let mut sum = 0.0;

    for (i, &value) in series.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= series[i - window];
        }
        if i + 1 >= window {
            out.push(Some(sum / window as f64));
        } else {
            out.push(None);
        }
    }

    out
}

/// Replace each leading `None` with the nearest following defined value.
pub fn backfill(values: &mut [Option<f64>]) {
    let mut next: Option<f64> = None;
    for slot in values.iter_mut().rev() {
        match slot {
            Some(v) => next = Some(*v),
            None => *slot = next,
        }
    }
}

/// Simple moving average with the warm-up gap back-filled from the first
/// available average. All `None` only when the series is shorter than the
/// window.
pub fn rolling_average(series: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = simple_moving_average(series, window);
    backfill(&mut out);
    out
}

/// Change in open interest as a percentage of open interest.
pub fn percentage_oi_change(change_in_oi: f64, open_interest: f64) -> Option<f64> {
    if open_interest == 0.0 {
        None
    } else {
        Some(change_in_oi / open_interest * 100.0)
    }
}

/// `true` where volume exceeds `factor` times its average. Undefined
/// averages never flag.
pub fn unusual_volume(volumes: &[f64], averages: &[Option<f64>], factor: f64) -> Vec<bool> {
    volumes
        .iter()
        .zip(averages)
        .map(|(&v, avg)| avg.is_some_and(|a| v > factor * a))
        .collect()
}
