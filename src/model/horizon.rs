//! Projection horizon: the closed period range `[0, t_max]`

use serde::{Deserialize, Serialize};

/// Closed discrete period range `[0, t_max]`, fixed for the lifetime of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Horizon {
    t_max: usize,
}

impl Horizon {
    pub fn new(t_max: usize) -> Self {
        Self { t_max }
    }

    /// Last period of the horizon
    pub fn t_max(&self) -> usize {
        self.t_max
    }

    /// Number of periods, i.e. the length of every series result
    pub fn len(&self) -> usize {
        self.t_max + 1
    }

    /// A horizon always holds at least period 0
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether a (possibly negative) period reference falls inside the horizon
    pub fn contains(&self, t: i64) -> bool {
        t >= 0 && (t as u64) <= self.t_max as u64
    }

    /// Converts a formula-side period into an index, if it is inside the horizon
    pub fn index(&self, t: i64) -> Option<usize> {
        if self.contains(t) {
            Some(t as usize)
        } else {
            None
        }
    }

    /// Periods in ascending order
    pub fn periods(&self) -> std::ops::RangeInclusive<usize> {
        0..=self.t_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_bounds() {
        let horizon = Horizon::new(12);
        assert_eq!(horizon.len(), 13);
        assert!(horizon.contains(0));
        assert!(horizon.contains(12));
        assert!(!horizon.contains(13));
        assert!(!horizon.contains(-1));
        assert_eq!(horizon.index(5), Some(5));
        assert_eq!(horizon.index(-3), None);
        assert_eq!(horizon.periods().count(), 13);
    }

    #[test]
    fn test_zero_horizon_has_one_period() {
        let horizon = Horizon::new(0);
        assert_eq!(horizon.len(), 1);
        assert!(horizon.contains(0));
    }
}
