//! The environment handed to every formula invocation

use crate::error::Result;
use crate::model::Horizon;
use std::sync::Arc;

/// Everything a formula may read: other variables, the model point and the horizon
///
/// Two implementations exist: the evaluator's per-run context, and the probe
/// used at seal time to discover which variables a formula references.
pub trait Scope {
    /// Value of `name` at period `t`; periods outside the horizon read as 0.0
    fn at(&self, name: &str, t: i64) -> Result<f64>;

    /// Value of a constant variable
    fn value(&self, name: &str) -> Result<f64>;

    /// Whole-horizon series of `name`
    fn series(&self, name: &str) -> Result<Arc<[f64]>>;

    /// Numeric model-point field
    fn input(&self, field: &str) -> Result<f64>;

    /// Text model-point field
    fn input_text(&self, field: &str) -> Result<String>;

    fn horizon(&self) -> Horizon;

    /// Last period of the horizon, as a formula-side period
    fn t_max(&self) -> i64 {
        self.horizon().t_max() as i64
    }
}

/// Horizon-length series of zeros
pub(crate) fn zeros(horizon: Horizon) -> Arc<[f64]> {
    vec![0.0; horizon.len()].into()
}
