//! Per-run result cache
//!
//! Holds every value computed during one model-point run:
//! - Scalar-mode values keyed by `(variable, period)`
//! - Whole-horizon series for vectorized variables and for scalar variables
//!   once every period has been computed
//!
//! A cache belongs to exactly one run and is dropped with it.

use crate::model::{Horizon, VariableId};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ResultCache {
    periods: usize,

    /// Per variable, per period; allocated on first store
    scalars: Vec<Vec<Option<f64>>>,

    /// Complete series by variable
    series: Vec<Option<Arc<[f64]>>>,

    /// Statistics
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl ResultCache {
    pub fn new(variables: usize, horizon: Horizon) -> Self {
        Self {
            periods: horizon.len(),
            scalars: vec![Vec::new(); variables],
            series: vec![None; variables],
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Look up a single period, from a stored series or a scalar entry
    pub fn scalar(&mut self, id: VariableId, t: usize) -> Option<f64> {
        let found = match &self.series[id.index()] {
            Some(series) => series.get(t).copied(),
            None => self.scalars[id.index()].get(t).copied().flatten(),
        };
        self.record(found.is_some());
        found
    }

    pub fn store_scalar(&mut self, id: VariableId, t: usize, value: f64) {
        let slots = &mut self.scalars[id.index()];
        if slots.is_empty() {
            slots.resize(self.periods, None);
        }
        slots[t] = Some(value);
    }

    pub fn series(&mut self, id: VariableId) -> Option<Arc<[f64]>> {
        let found = self.series[id.index()].clone();
        self.record(found.is_some());
        found
    }

    pub fn has_series(&self, id: VariableId) -> bool {
        self.series[id.index()].is_some()
    }

    /// Store a complete series; per-period entries for the variable are released
    pub fn store_series(&mut self, id: VariableId, values: Arc<[f64]>) {
        debug_assert_eq!(values.len(), self.periods);
        self.series[id.index()] = Some(values);
        self.scalars[id.index()] = Vec::new();
    }

    /// Number of variables with a complete series
    pub fn series_count(&self) -> usize {
        self.series.iter().filter(|s| s.is_some()).count()
    }

    /// Number of individually cached periods not yet folded into a series
    pub fn scalar_count(&self) -> usize {
        self.scalars
            .iter()
            .map(|slots| slots.iter().filter(|v| v.is_some()).count())
            .sum()
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    fn record(&mut self, hit: bool) {
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip_and_stats() {
        let mut cache = ResultCache::new(2, Horizon::new(3));
        let a = VariableId(0);

        assert_eq!(cache.scalar(a, 1), None);
        cache.store_scalar(a, 1, 4.5);
        assert_eq!(cache.scalar(a, 1), Some(4.5));
        assert_eq!(cache.scalar(a, 2), None);

        assert_eq!(cache.cache_hits, 1);
        assert_eq!(cache.cache_misses, 2);
        assert!((cache.hit_rate() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(cache.scalar_count(), 1);
    }

    #[test]
    fn test_series_supersedes_scalars() {
        let mut cache = ResultCache::new(1, Horizon::new(2));
        let a = VariableId(0);

        cache.store_scalar(a, 0, 1.0);
        cache.store_series(a, vec![1.0, 2.0, 3.0].into());

        assert!(cache.has_series(a));
        assert_eq!(cache.scalar(a, 2), Some(3.0));
        assert_eq!(cache.scalar_count(), 0);
        assert_eq!(cache.series_count(), 1);
        assert_eq!(cache.series(a).unwrap().len(), 3);
    }
}
