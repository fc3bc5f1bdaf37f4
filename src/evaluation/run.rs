//! Evaluator for one model point
//!
//! A [`Run`] owns the result cache and recursion state of a single model
//! point and borrows the sealed model read-only. Values are computed lazily:
//!
//! - Acyclic time-indexed variables compute only the requested period; a full
//!   series is materialized by a loop over the horizon
//! - Cycles are swept period by period, members in declaration order.
//!   Backward cycles sweep from `t_max` down, all others from 0 up
//! - Within a sweep, calls that look the other way are resolved by memoized
//!   recursion per `(variable, t)`, bounded by the look-ahead they need
//! - Array variables run once, after their scalar prerequisites are materialized

use super::cache::ResultCache;
use super::Scope;
use crate::error::{ModelError, Result};
use crate::graph::{CalcDirection, CycleId, Step};
use crate::input::ModelPoint;
use crate::model::{Formula, Horizon, Model, VariableId, VariableKind};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

/// Isolated evaluation context for one model point
///
/// Not `Sync`: a run is driven by a single thread. Parallelism happens across
/// runs, each with its own cache.
pub struct Run<'m> {
    model: &'m Model,
    point: &'m ModelPoint,
    cache: RefCell<ResultCache>,
    frames: RefCell<Frames>,
    /// Cycles whose period sweep is in progress
    sweeping: RefCell<Vec<bool>>,
}

/// Scalar evaluations currently on the call stack
#[derive(Debug)]
struct Frames {
    active: HashSet<(VariableId, usize)>,
    depth: Vec<usize>,
}

/// Pops its frame when dropped, on success and error paths alike
struct Frame<'r> {
    frames: &'r RefCell<Frames>,
    key: (VariableId, usize),
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        let mut frames = self.frames.borrow_mut();
        frames.active.remove(&self.key);
        frames.depth[self.key.0.index()] -= 1;
    }
}

impl<'m> Run<'m> {
    pub fn new(model: &'m Model, point: &'m ModelPoint) -> Self {
        let variables = model.catalog().len();
        Self {
            model,
            point,
            cache: RefCell::new(ResultCache::new(variables, model.horizon())),
            frames: RefCell::new(Frames {
                active: HashSet::new(),
                depth: vec![0; variables],
            }),
            sweeping: RefCell::new(vec![false; model.cycles().cycle_count()]),
        }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn point(&self) -> &'m ModelPoint {
        self.point
    }

    /// Value of `name` at period `t`
    pub fn value_at(&self, name: &str, t: usize) -> Result<f64> {
        let id = self.model.catalog().resolve(name, None)?;
        let t_max = self.model.horizon().t_max();
        if t > t_max {
            return Err(ModelError::PeriodOutOfRange {
                variable: name.to_string(),
                period: t as i64,
                t_max,
            });
        }
        self.value_of(id, t)
    }

    /// Complete series of `name`, one value per horizon period
    pub fn full_series(&self, name: &str) -> Result<Arc<[f64]>> {
        let id = self.model.catalog().resolve(name, None)?;
        self.series_of(id)
    }

    /// Execute the whole schedule, leaving every variable's series cached
    pub fn run_all(&self) -> Result<()> {
        for step in self.model.schedule().steps() {
            match *step {
                Step::Constant(id) => {
                    self.constant_of(id)?;
                }
                Step::Scalar(id) | Step::Materialize(id) | Step::Vectorize(id) => {
                    self.series_of(id)?;
                }
                Step::Cycle(cycle) => self.sweep_cycle(cycle)?,
            }
        }

        let cache = self.cache.borrow();
        log::debug!(
            "Model point '{}': {} series computed, cache hit rate {:.1}%",
            self.point.id(),
            cache.series_count(),
            cache.hit_rate() * 100.0
        );
        Ok(())
    }

    /// Number of variables whose complete series is cached
    pub fn cached_series(&self) -> usize {
        self.cache.borrow().series_count()
    }

    /// Fraction of cache lookups answered from the cache so far
    pub fn cache_hit_rate(&self) -> f64 {
        self.cache.borrow().hit_rate()
    }

    // --- Evaluation by id ---

    fn value_of(&self, id: VariableId, t: usize) -> Result<f64> {
        match self.model.catalog().kind(id) {
            VariableKind::Constant => self.constant_of(id),
            VariableKind::Array => Ok(self.series_of(id)?[t]),
            VariableKind::TimeIndexed => {
                let cached = self.cache.borrow_mut().scalar(id, t);
                if let Some(value) = cached {
                    return Ok(value);
                }

                match self.model.cycles().cycle_of(id) {
                    // an acyclic formula never reads its own other periods
                    None => self.scalar_of(id, t),
                    Some(cycle) if self.is_sweeping(cycle) => self.scalar_of(id, t),
                    Some(cycle) => {
                        self.sweep_cycle(cycle)?;
                        Ok(self.series_of(id)?[t])
                    }
                }
            }
        }
    }

    fn series_of(&self, id: VariableId) -> Result<Arc<[f64]>> {
        let cached = self.cache.borrow_mut().series(id);
        if let Some(series) = cached {
            return Ok(series);
        }

        let series: Arc<[f64]> = match self.model.catalog().kind(id) {
            VariableKind::Constant => {
                let value = self.constant_of(id)?;
                vec![value; self.model.horizon().len()].into()
            }
            VariableKind::Array => self.vectorize(id)?,
            VariableKind::TimeIndexed => match self.model.cycles().cycle_of(id) {
                Some(cycle) if !self.is_sweeping(cycle) => {
                    self.sweep_cycle(cycle)?;
                    let swept = self.cache.borrow_mut().series(id);
                    match swept {
                        Some(series) => return Ok(series),
                        None => self.materialize(id)?,
                    }
                }
                _ => self.materialize(id)?,
            },
        };

        self.cache.borrow_mut().store_series(id, series.clone());
        Ok(series)
    }

    fn constant_of(&self, id: VariableId) -> Result<f64> {
        let cached = self.cache.borrow_mut().scalar(id, 0);
        if let Some(value) = cached {
            return Ok(value);
        }

        let formula = match self.model.catalog().variable(id).formula() {
            Formula::Constant(f) => f,
            _ => return self.value_of(id, 0),
        };
        let value = {
            let _frame = self.enter(id, 0)?;
            formula(self)?
        };
        self.cache.borrow_mut().store_scalar(id, 0, value);
        Ok(value)
    }

    /// Compute one period of a time-indexed variable, memoized
    fn scalar_of(&self, id: VariableId, t: usize) -> Result<f64> {
        let cached = self.cache.borrow_mut().scalar(id, t);
        if let Some(value) = cached {
            return Ok(value);
        }

        let formula = match self.model.catalog().variable(id).formula() {
            Formula::TimeIndexed(f) => f,
            _ => return self.value_of(id, t),
        };
        let value = {
            let _frame = self.enter(id, t)?;
            formula(self, t as i64)?
        };
        self.cache.borrow_mut().store_scalar(id, t, value);
        Ok(value)
    }

    /// Every period of a time-indexed variable, in ascending period order
    fn materialize(&self, id: VariableId) -> Result<Arc<[f64]>> {
        let values = self
            .model
            .horizon()
            .periods()
            .map(|t| self.scalar_of(id, t))
            .collect::<Result<Vec<f64>>>()?;
        Ok(values.into())
    }

    fn vectorize(&self, id: VariableId) -> Result<Arc<[f64]>> {
        for &dep in self.model.schedule().prerequisites(id) {
            self.series_of(dep)?;
        }

        let variable = self.model.catalog().variable(id);
        let formula = match variable.formula() {
            Formula::Array(f) => f,
            _ => return self.series_of(id),
        };
        let values = {
            let _frame = self.enter(id, 0)?;
            formula(self)?
        };

        let expected = self.model.horizon().len();
        if values.len() != expected {
            return Err(ModelError::ArrayLengthMismatch {
                context: variable.name().to_string(),
                expected,
                actual: values.len(),
            });
        }
        Ok(values.into())
    }

    // --- Cycles ---

    fn is_sweeping(&self, cycle: CycleId) -> bool {
        self.sweeping.borrow()[cycle]
    }

    fn sweep_cycle(&self, cycle: CycleId) -> Result<()> {
        let members = self.model.cycles().members(cycle);
        let done = {
            let cache = self.cache.borrow();
            members.iter().all(|&m| cache.has_series(m))
        };
        if done || self.is_sweeping(cycle) {
            return Ok(());
        }

        self.sweeping.borrow_mut()[cycle] = true;
        let outcome = self.sweep_periods(cycle, members);
        self.sweeping.borrow_mut()[cycle] = false;
        outcome
    }

    fn sweep_periods(&self, cycle: CycleId, members: &[VariableId]) -> Result<()> {
        let mut periods: Vec<usize> = self.model.horizon().periods().collect();
        if self.model.schedule().direction(cycle) == CalcDirection::Backward {
            periods.reverse();
        }

        for t in periods {
            for &member in members {
                self.value_of(member, t)?;
            }
        }

        for &member in members {
            if self.model.catalog().kind(member) == VariableKind::TimeIndexed {
                let series = self.materialize(member)?;
                self.cache.borrow_mut().store_series(member, series);
            }
        }
        Ok(())
    }

    // --- Recursion guard ---

    fn enter(&self, id: VariableId, t: usize) -> Result<Frame<'_>> {
        let limit = self.model.horizon().len();
        let mut frames = self.frames.borrow_mut();
        if frames.depth[id.index()] >= limit || !frames.active.insert((id, t)) {
            return Err(ModelError::RecursionLimit {
                variable: self.model.catalog().name(id).to_string(),
                period: t,
            });
        }
        frames.depth[id.index()] += 1;

        Ok(Frame {
            frames: &self.frames,
            key: (id, t),
        })
    }
}

impl Scope for Run<'_> {
    fn at(&self, name: &str, t: i64) -> Result<f64> {
        let id = self.model.catalog().resolve(name, None)?;
        if self.model.catalog().kind(id) == VariableKind::Constant {
            return self.constant_of(id);
        }
        match self.model.horizon().index(t) {
            Some(t) => self.value_of(id, t),
            None => Ok(0.0),
        }
    }

    fn value(&self, name: &str) -> Result<f64> {
        let id = self.model.catalog().resolve(name, None)?;
        self.value_of(id, 0)
    }

    fn series(&self, name: &str) -> Result<Arc<[f64]>> {
        let id = self.model.catalog().resolve(name, None)?;
        self.series_of(id)
    }

    fn input(&self, field: &str) -> Result<f64> {
        self.point.number(field)
    }

    fn input_text(&self, field: &str) -> Result<String> {
        self.point.text(field)
    }

    fn horizon(&self) -> Horizon {
        self.model.horizon()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::discount;
    use crate::model::ModelBuilder;
    use approx::assert_relative_eq;
    use rayon::prelude::*;

    const T_MAX: usize = 8;

    /// A model exercising every evaluation path
    fn mixed_model() -> Model {
        let mut b = ModelBuilder::new(T_MAX);
        b.constant("v", |_| Ok(0.9)).unwrap();
        b.constant("q", |s| Ok(s.input("q").unwrap_or(0.01))).unwrap();

        // forward self-recursion
        b.time_indexed("lives", |s, t| {
            if t == 0 {
                Ok(1.0)
            } else {
                Ok(s.at("lives", t - 1)? * (1.0 - s.value("q")?))
            }
        })
        .unwrap();

        // acyclic scalar
        b.time_indexed("claims", |s, t| {
            Ok(s.at("lives", t)? * s.value("q")? * 1000.0)
        })
        .unwrap();

        // backward self-recursion
        b.time_indexed("reserve", |s, t| {
            Ok(s.at("claims", t)? + s.at("reserve", t + 1)? * s.value("v")?)
        })
        .unwrap();

        // vectorized counterpart of reserve
        b.array("pv_claims", |s| {
            let rates = vec![s.value("v")?; s.horizon().len()];
            discount(&s.series("claims")?, &rates)
        })
        .unwrap();

        // two-member cycle looking both ways
        b.time_indexed("a", |s, t| Ok(s.at("b", t + 1)? + 1.0)).unwrap();
        b.time_indexed("b", |s, t| s.at("a", t - 2)).unwrap();

        // forward two-member cycle
        b.time_indexed("fund", |s, t| {
            Ok(100.0 + s.at("interest", t - 1)?)
        })
        .unwrap();
        b.time_indexed("interest", |s, t| Ok(s.at("fund", t)? * 0.05)).unwrap();

        b.seal().unwrap()
    }

    fn names(model: &Model) -> Vec<String> {
        model.catalog().names().map(str::to_string).collect()
    }

    #[test]
    fn test_value_at_matches_full_series_for_every_variable() {
        let model = mixed_model();
        let point = ModelPoint::new("1").with_field("q", 0.02);

        for name in names(&model) {
            let series = model.run(&point).full_series(&name).unwrap();
            assert_eq!(series.len(), T_MAX + 1);

            for t in 0..=T_MAX {
                // fresh run per query so every path starts from an empty cache
                let fresh = model.run(&point).value_at(&name, t).unwrap();
                assert_eq!(fresh, series[t], "{} at t={}", name, t);
            }

            let shared = model.run(&point);
            for t in (0..=T_MAX).rev() {
                assert_eq!(shared.value_at(&name, t).unwrap(), series[t]);
            }
        }
    }

    #[test]
    fn test_backward_recursion_equals_discount() {
        let model = mixed_model();
        let point = ModelPoint::empty();
        let run = model.run(&point);

        let reserve = run.full_series("reserve").unwrap();
        let pv = run.full_series("pv_claims").unwrap();
        for t in 0..=T_MAX {
            assert_relative_eq!(reserve[t], pv[t], max_relative = 1e-12);
        }
        assert_relative_eq!(reserve[T_MAX], run.value_at("claims", T_MAX).unwrap());
    }

    #[test]
    fn test_cycle_values() {
        let model = mixed_model();
        let point = ModelPoint::empty();
        let run = model.run(&point);

        let a = model.catalog().lookup("a").unwrap();
        let cycle = model.cycles().cycle_of(a).unwrap();
        assert_eq!(model.schedule().direction(cycle), CalcDirection::Mixed);

        // a(t) = a(t-1) + 1 while t + 1 stays inside the horizon
        assert_eq!(run.value_at("a", 3).unwrap(), 4.0);
        assert_eq!(run.value_at("b", 3).unwrap(), 2.0);
        assert_eq!(run.value_at("a", T_MAX).unwrap(), 1.0);

        let fund = run.full_series("fund").unwrap();
        assert_eq!(fund[0], 100.0);
        assert_relative_eq!(fund[1], 105.0);
        assert_relative_eq!(fund[2], 105.25);
    }

    #[test]
    fn test_run_all_materializes_everything() {
        let model = mixed_model();
        let point = ModelPoint::empty();
        let run = model.run(&point);

        run.run_all().unwrap();
        assert_eq!(run.cached_series(), model.catalog().len() - 2);
        assert!(run.cache_hit_rate() > 0.0);
        // constants resolve from their single scalar entry
        assert_eq!(run.value_at("v", 4).unwrap(), 0.9);
    }

    #[test]
    fn test_period_out_of_range() {
        let model = mixed_model();
        let point = ModelPoint::empty();
        let run = model.run(&point);

        assert!(matches!(
            run.value_at("claims", T_MAX + 1),
            Err(ModelError::PeriodOutOfRange { .. })
        ));
        assert!(matches!(
            run.value_at("ghost", 0),
            Err(ModelError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_array_length_mismatch_is_isolated() {
        let mut b = ModelBuilder::new(4);
        b.time_indexed("cf", |_, t| Ok(t as f64)).unwrap();
        b.array("short", |s| Ok(s.series("cf")?[..3].to_vec())).unwrap();
        b.array("ok", |s| Ok(s.series("cf")?.iter().map(|x| x * 2.0).collect()))
            .unwrap();
        let model = b.seal().unwrap();
        let point = ModelPoint::empty();
        let run = model.run(&point);

        assert_eq!(
            run.full_series("short").unwrap_err(),
            ModelError::ArrayLengthMismatch {
                context: "short".into(),
                expected: 5,
                actual: 3,
            }
        );
        assert!(run.value_at("short", 0).is_err());

        // earlier results stay intact and other variables still evaluate
        assert_eq!(run.full_series("cf").unwrap().as_ref(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(run.value_at("ok", 4).unwrap(), 8.0);
        assert!(run.run_all().is_err());
    }

    #[test]
    fn test_same_period_cycle_hits_recursion_limit() {
        let mut b = ModelBuilder::new(3);
        b.time_indexed("x", |s, t| s.at("y", t)).unwrap();
        b.time_indexed("y", |s, t| Ok(s.at("x", t)? + 1.0)).unwrap();
        let model = b.seal().unwrap();
        let point = ModelPoint::empty();

        let err = model.run(&point).value_at("y", 2).unwrap_err();
        assert!(matches!(err, ModelError::RecursionLimit { .. }));
    }

    #[test]
    fn test_undetected_cycle_fails_instead_of_looping() {
        let mut b = ModelBuilder::new(5);
        b.time_indexed("a", |s, t| {
            if s.input("linked")? > 0.0 {
                s.at("b", t)
            } else {
                Ok(1.0)
            }
        })
        .unwrap();
        b.time_indexed("b", |s, t| Ok(s.at("a", t)? * 2.0)).unwrap();
        let model = b.seal().unwrap();
        assert_eq!(model.cycles().cycle_count(), 0);

        let unlinked = ModelPoint::new("u").with_field("linked", 0);
        assert_eq!(model.run(&unlinked).value_at("b", 5).unwrap(), 2.0);

        let linked = ModelPoint::new("l").with_field("linked", 1);
        assert!(matches!(
            model.run(&linked).value_at("b", 5),
            Err(ModelError::RecursionLimit { .. })
        ));
    }

    #[test]
    fn test_model_points_do_not_share_results() {
        let model = mixed_model();
        let points: Vec<ModelPoint> = (0..8)
            .map(|i| ModelPoint::new(i.to_string()).with_field("q", 0.01 * (i + 1) as f64))
            .collect();

        let parallel: Vec<Vec<f64>> = points
            .par_iter()
            .map(|point| {
                let run = model.run(point);
                run.run_all().unwrap();
                run.full_series("claims").unwrap().to_vec()
            })
            .collect();

        for (point, claims) in points.iter().zip(&parallel) {
            let alone = model.run(point).full_series("claims").unwrap();
            assert_eq!(claims.as_slice(), alone.as_ref());
        }
        assert_ne!(parallel[0], parallel[1]);

        // a fresh run never starts with another run's entries
        let first = model.run(&points[0]);
        first.run_all().unwrap();
        let second = model.run(&points[1]);
        assert_eq!(second.cached_series(), 0);
    }

    #[test]
    fn test_mixed_cycle_on_long_horizon_is_swept() {
        let mut b = ModelBuilder::new(720);
        b.time_indexed("a", |s, t| Ok(s.at("a", t - 1)? + 1.0 + s.at("c", t)?))
            .unwrap();
        b.time_indexed("c", |s, t| s.at("d", t + 1)).unwrap();
        b.time_indexed("d", |s, t| Ok(s.at("a", t - 2)? * 0.0)).unwrap();
        let model = b.seal().unwrap();

        let a = model.catalog().lookup("a").unwrap();
        let cycle = model.cycles().cycle_of(a).unwrap();
        assert_eq!(model.schedule().direction(cycle), CalcDirection::Mixed);

        let point = ModelPoint::empty();
        assert_eq!(model.run(&point).value_at("a", 720).unwrap(), 721.0);
        assert_eq!(model.run(&point).full_series("a").unwrap()[720], 721.0);
    }

    #[test]
    fn test_acyclic_value_needs_only_its_own_period() {
        let mut b = ModelBuilder::new(10);
        b.time_indexed("x", |_, t| {
            if t > 5 {
                Err(ModelError::formula("x", "beyond term"))
            } else {
                Ok(t as f64 * 2.0)
            }
        })
        .unwrap();
        b.time_indexed("y", |s, t| Ok(s.at("x", t)? + 1.0)).unwrap();
        let model = b.seal().unwrap();
        let point = ModelPoint::empty();
        let run = model.run(&point);

        assert_eq!(run.value_at("x", 2).unwrap(), 4.0);
        assert_eq!(run.value_at("y", 5).unwrap(), 11.0);
        assert!(matches!(
            run.value_at("y", 6),
            Err(ModelError::Formula { .. })
        ));
        assert!(run.full_series("x").is_err());
        // periods computed before the failure stay cached
        assert_eq!(run.value_at("x", 3).unwrap(), 6.0);
    }
}
