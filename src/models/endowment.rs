//! Endowment assurance
//!
//! Pays the sum assured on death within the remaining term, or on survival
//! to its end. Monthly periods, flat mortality and interest.
//!
//! Model-point fields:
//! - `sum_assured`: benefit amount
//! - `remaining_term`: months until maturity

use crate::discount::discount;
use crate::error::Result;
use crate::model::{Model, ModelBuilder};

/// Monthly interest rate (default: 0.5%)
pub const INTEREST_RATE: f64 = 0.005;

/// Monthly probability of death (default: 0.3%)
pub const DEATH_PROB: f64 = 0.003;

/// Build and seal the endowment model over periods `0..=t_max`
pub fn build(t_max: usize) -> Result<Model> {
    let mut b = ModelBuilder::new(t_max);

    b.constant("interest_rate", |_| Ok(INTEREST_RATE))?;
    b.constant("death_prob", |_| Ok(DEATH_PROB))?;
    b.constant("discount_factor", |s| Ok(1.0 / (1.0 + s.value("interest_rate")?)))?;

    // probability of surviving to the end of period t
    b.time_indexed("survival_rate", |s, t| {
        let prior = if t == 0 { 1.0 } else { s.at("survival_rate", t - 1)? };
        Ok(prior * (1.0 - s.value("death_prob")?))
    })?;

    b.time_indexed("expected_benefit", |s, t| {
        let sum_assured = s.input("sum_assured")?;
        let remaining_term = s.input("remaining_term")?;
        let period = t as f64;

        if period < remaining_term {
            let in_force = if t == 0 { 1.0 } else { s.at("survival_rate", t - 1)? };
            Ok(in_force * s.value("death_prob")? * sum_assured)
        } else if period == remaining_term {
            Ok(s.at("survival_rate", t)? * sum_assured)
        } else {
            Ok(0.0)
        }
    })?;
    // the death branch is never taken while probing with zero inputs
    b.depends_on("expected_benefit", &["death_prob"])?;

    b.time_indexed("net_single_premium", |s, t| {
        Ok(s.at("expected_benefit", t)?
            + s.at("net_single_premium", t + 1)? * s.value("discount_factor")?)
    })?;

    // vectorized counterpart of net_single_premium
    b.array("pv_benefits", |s| {
        let rates = vec![s.value("discount_factor")?; s.horizon().len()];
        discount(&s.series("expected_benefit")?, &rates)
    })?;

    b.seal()
}
