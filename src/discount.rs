//! Backward discounting of cash-flow series
//!
//! Supports:
//! - The O(n) backward recurrence used by vectorized present-value variables
//! - Discount curves from a single annual rate or a spot curve, turned into
//!   the per-period factor vectors the recurrence consumes

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Present value at every period of a cash-flow series
///
/// `pv[n-1] = cf[n-1]` and `pv[i] = cf[i] + pv[i+1] * rates[i+1]`, so
/// `rates[i]` is the one-period factor taking period `i` back to `i-1` and
/// `rates[0]` is never read.
pub fn discount(cash_flows: &[f64], discount_rates: &[f64]) -> Result<Vec<f64>> {
    check_lengths(cash_flows, discount_rates)?;

    let n = cash_flows.len();
    let mut pv = vec![0.0; n];
    pv[n - 1] = cash_flows[n - 1];
    for i in (0..n - 1).rev() {
        pv[i] = cash_flows[i] + pv[i + 1] * discount_rates[i + 1];
    }
    Ok(pv)
}

/// Same recurrence as [`discount`], written as a reverse scan
pub fn discount_scan(cash_flows: &[f64], discount_rates: &[f64]) -> Result<Vec<f64>> {
    check_lengths(cash_flows, discount_rates)?;

    let mut pv: Vec<f64> = (0..cash_flows.len())
        .rev()
        .scan(None, |later: &mut Option<f64>, i| {
            let value = match *later {
                Some(next) => cash_flows[i] + next * discount_rates[i + 1],
                None => cash_flows[i],
            };
            *later = Some(value);
            Some(value)
        })
        .collect();
    pv.reverse();
    Ok(pv)
}

fn check_lengths(cash_flows: &[f64], discount_rates: &[f64]) -> Result<()> {
    if cash_flows.is_empty() || cash_flows.len() != discount_rates.len() {
        return Err(ModelError::ArrayLengthMismatch {
            context: "discount".to_string(),
            expected: cash_flows.len().max(1),
            actual: discount_rates.len(),
        });
    }
    Ok(())
}

/// Discount curve for present-value variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountCurve {
    /// Flat annual rate, used where no spot rate is given
    pub annual_rate: f64,

    /// Optional: spot rate curve
    /// Index = period, value = annual spot rate to that point
    pub spot_rates: Option<Vec<f64>>,

    /// Periods per year (12 for monthly projections)
    pub periods_per_year: u32,
}

impl DiscountCurve {
    /// Monthly curve with a single annual rate
    pub fn single_rate(annual_rate: f64) -> Self {
        Self {
            annual_rate,
            spot_rates: None,
            periods_per_year: 12,
        }
    }

    /// Monthly curve from spot rates; later periods fall back to the last spot
    pub fn from_spot_curve(spot_rates: Vec<f64>) -> Self {
        let annual_rate = spot_rates.last().copied().unwrap_or(0.0);
        Self {
            annual_rate,
            spot_rates: Some(spot_rates),
            periods_per_year: 12,
        }
    }

    pub fn with_periods_per_year(mut self, periods_per_year: u32) -> Self {
        self.periods_per_year = periods_per_year.max(1);
        self
    }

    /// Discount factor from period `t` back to period 0
    pub fn factor_to(&self, t: usize) -> f64 {
        let years = t as f64 / self.periods_per_year as f64;
        match self.spot_rates.as_deref() {
            Some(spots) if t < spots.len() => (1.0 + spots[t]).powf(-years),
            _ => (1.0 + self.annual_rate).powf(-years),
        }
    }

    /// Discount factors to period 0 for periods `0..len`
    pub fn factors(&self, len: usize) -> Vec<f64> {
        (0..len).map(|t| self.factor_to(t)).collect()
    }

    /// One-period factors in the layout [`discount`] expects
    ///
    /// Entry `t` takes a value at period `t` back to `t-1`; entry 0 is 1.0.
    pub fn one_period_rates(&self, len: usize) -> Vec<f64> {
        let factors = self.factors(len);
        (0..len)
            .map(|t| if t == 0 { 1.0 } else { factors[t] / factors[t - 1] })
            .collect()
    }

    /// Present value at period 0 of a cash-flow series
    pub fn present_value(&self, cash_flows: &[f64]) -> Result<f64> {
        let rates = self.one_period_rates(cash_flows.len());
        Ok(discount(cash_flows, &rates)?[0])
    }
}

impl Default for DiscountCurve {
    fn default() -> Self {
        Self::single_rate(0.0475) // 4.75% default valuation rate
    }
}
