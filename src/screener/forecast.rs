//! Holt's linear-trend exponential smoothing for close-price forecasts.
//!
//! `level_t = α·y_t + (1 − α)·(level_{t−1} + trend_{t−1})`
//! `trend_t = β·(level_t − level_{t−1}) + (1 − β)·trend_{t−1}`
//! `ŷ_{t+h} = level_t + h·trend_t`

use crate::error::ScreenerError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALPHA: f64 = 0.3;
pub const DEFAULT_BETA: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoltForecast {
    alpha: f64,
    beta: f64,
    level: f64,
    trend: f64,
    fitted: bool,
}

impl HoltForecast {
    /// Both smoothing parameters must lie in (0, 1)
    pub fn new(alpha: f64, beta: f64) -> Result<Self, ScreenerError> {
        for (name, value) in [("alpha", alpha), ("beta", beta)] {
            if !(0.0 < value && value < 1.0) {
                return Err(ScreenerError::InvalidParameter {
                    name: name.to_string(),
                    reason: "must be between 0 and 1 (exclusive)".to_string(),
                });
            }
        }

        Ok(Self {
            alpha,
            beta,
            level: 0.0,
            trend: 0.0,
            fitted: false,
        })
    }

    pub fn fit(&mut self, data: &[f64]) -> Result<(), ScreenerError> {
        if data.len() < 3 {
            return Err(ScreenerError::InsufficientData {
                required: 3,
                actual: data.len(),
            });
        }

        self.level = data[0];
        self.trend = data[1] - data[0];

        for &value in &data[1..] {
            let prev_level = self.level;
            self.level = self.alpha * value + (1.0 - self.alpha) * (self.level + self.trend);
            self.trend = self.beta * (self.level - prev_level) + (1.0 - self.beta) * self.trend;
        }

        self.fitted = true;
        Ok(())
    }

    /// Empty until fitted
    pub fn predict(&self, steps: usize) -> Vec<f64> {
        if !self.fitted {
            return Vec::new();
        }
        (1..=steps)
            .map(|h| self.level + h as f64 * self.trend)
            .collect()
    }

    pub fn components(&self) -> (f64, f64) {
        (self.level, self.trend)
    }
}

/// Fit with the given parameters and forecast `steps` ahead
pub fn forecast_prices(
    closes: &[f64],
    steps: usize,
    alpha: f64,
    beta: f64,
) -> Result<Vec<f64>, ScreenerError> {
    let mut model = HoltForecast::new(alpha, beta)?;
    model.fit(closes)?;
    Ok(model.predict(steps))
}
