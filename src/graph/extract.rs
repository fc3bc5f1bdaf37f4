//! Dependency extraction by probe evaluation
//!
//! Every formula is run once per period against a [`Probe`] scope that
//! answers each request with a sentinel (zeros, empty text) and records which
//! catalog members were referenced and at which period offsets. Statically
//! declared dependencies are merged in afterwards. Results live in ordered
//! collections, so extracting twice from the same catalog yields the same
//! edge sets.

use crate::error::{ModelError, Result};
use crate::evaluation::{scope::zeros, Scope};
use crate::model::{Catalog, Formula, Horizon, VariableId};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// How a caller references one callee
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallShape {
    /// Period offsets `k` of `callee(t + k)` calls made by a time-indexed caller
    pub offsets: BTreeSet<i64>,

    /// Whether the caller requested the callee's whole series
    pub whole_series: bool,
}

/// Extracted call sets, one ordered map per variable in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependencies {
    calls: Vec<BTreeMap<VariableId, CallShape>>,
}

impl Dependencies {
    /// Callees of `id` with their call shapes
    pub fn calls(&self, id: VariableId) -> &BTreeMap<VariableId, CallShape> {
        &self.calls[id.index()]
    }

    /// Callees of `id`, ascending by declaration order
    pub fn callees(&self, id: VariableId) -> impl Iterator<Item = VariableId> + '_ {
        self.calls[id.index()].keys().copied()
    }

    /// Every (caller, callee) edge, caller-major in declaration order
    pub fn edges(&self) -> Vec<(VariableId, VariableId)> {
        self.calls
            .iter()
            .enumerate()
            .flat_map(|(caller, callees)| {
                callees
                    .keys()
                    .map(move |&callee| (VariableId(caller), callee))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.calls.iter().map(BTreeMap::len).sum()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Period sweep order a group of mutually dependent variables needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcDirection {
    /// No period relationship between members
    Irrelevant,
    /// Members only look back (`t - k`): sweep `0..=t_max`
    Forward,
    /// Members only look ahead (`t + k`): sweep `t_max..=0`
    Backward,
    /// Both directions, or whole-series requests: resolved by recursion
    Mixed,
}

impl fmt::Display for CalcDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalcDirection::Irrelevant => "irrelevant",
            CalcDirection::Forward => "forward",
            CalcDirection::Backward => "backward",
            CalcDirection::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// Derive the sweep direction of `members` from the offsets of their internal calls
pub fn calc_direction(dependencies: &Dependencies, members: &[VariableId]) -> CalcDirection {
    let mut looks_back = false;
    let mut looks_ahead = false;

    for &member in members {
        for (callee, shape) in dependencies.calls(member) {
            if !members.contains(callee) {
                continue;
            }
            if shape.whole_series {
                return CalcDirection::Mixed;
            }
            looks_back |= shape.offsets.iter().any(|&k| k < 0);
            looks_ahead |= shape.offsets.iter().any(|&k| k > 0);
        }
    }

    match (looks_back, looks_ahead) {
        (false, false) => CalcDirection::Irrelevant,
        (true, false) => CalcDirection::Forward,
        (false, true) => CalcDirection::Backward,
        (true, true) => CalcDirection::Mixed,
    }
}

/// Discover the call set of every catalog variable
pub fn extract(catalog: &Catalog, horizon: Horizon) -> Result<Dependencies> {
    let mut calls = Vec::with_capacity(catalog.len());

    for variable in catalog.iter() {
        let probe = Probe::new(catalog, horizon, variable.name());

        match variable.formula() {
            Formula::Constant(f) => probe.observe(f(&probe))?,
            Formula::Array(f) => probe.observe(f(&probe))?,
            Formula::TimeIndexed(f) => {
                for t in horizon.periods() {
                    let t = t as i64;
                    probe.period.set(Some(t));
                    probe.observe(f(&probe, t))?;
                }
            }
        }

        let mut found = probe.finish()?;
        for name in variable.declared_dependencies() {
            let callee = catalog.resolve(name, Some(variable.name()))?;
            found.entry(callee).or_default();
        }

        log::debug!(
            "Variable '{}' references {} variable(s)",
            variable.name(),
            found.len()
        );
        calls.push(found);
    }

    Ok(Dependencies { calls })
}

/// Recording scope used while extracting dependencies
struct Probe<'c> {
    catalog: &'c Catalog,
    horizon: Horizon,
    caller: &'c str,
    /// Period being probed, `None` for constant and array formulas
    period: Cell<Option<i64>>,
    calls: RefCell<BTreeMap<VariableId, CallShape>>,
    /// First reference to a name outside the catalog
    unknown: RefCell<Option<ModelError>>,
}

impl<'c> Probe<'c> {
    fn new(catalog: &'c Catalog, horizon: Horizon, caller: &'c str) -> Self {
        Self {
            catalog,
            horizon,
            caller,
            period: Cell::new(None),
            calls: RefCell::new(BTreeMap::new()),
            unknown: RefCell::new(None),
        }
    }

    fn record(&self, name: &str, offset: Option<i64>, whole_series: bool) -> Result<()> {
        let callee = match self.catalog.resolve(name, Some(self.caller)) {
            Ok(id) => id,
            Err(err) => {
                self.unknown.borrow_mut().get_or_insert_with(|| err.clone());
                return Err(err);
            }
        };

        let mut calls = self.calls.borrow_mut();
        let shape = calls.entry(callee).or_default();
        if let Some(k) = offset {
            shape.offsets.insert(k);
        }
        shape.whole_series |= whole_series;
        Ok(())
    }

    /// Discard a probe result, keeping only structural failures
    fn observe<T>(&self, outcome: Result<T>) -> Result<()> {
        match outcome {
            Ok(_) => Ok(()),
            Err(err) if err.is_structural() => Err(err),
            Err(err) => {
                log::debug!("Ignoring probe failure in '{}': {}", self.caller, err);
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<BTreeMap<VariableId, CallShape>> {
        if let Some(err) = self.unknown.into_inner() {
            return Err(err);
        }
        Ok(self.calls.into_inner())
    }
}

impl Scope for Probe<'_> {
    fn at(&self, name: &str, t: i64) -> Result<f64> {
        let offset = self.period.get().map(|p| t - p);
        self.record(name, offset, false)?;
        Ok(0.0)
    }

    fn value(&self, name: &str) -> Result<f64> {
        self.record(name, None, false)?;
        Ok(0.0)
    }

    fn series(&self, name: &str) -> Result<Arc<[f64]>> {
        self.record(name, None, true)?;
        Ok(zeros(self.horizon))
    }

    fn input(&self, _field: &str) -> Result<f64> {
        Ok(0.0)
    }

    fn input_text(&self, _field: &str) -> Result<String> {
        Ok(String::new())
    }

    fn horizon(&self) -> Horizon {
        self.horizon
    }
}
