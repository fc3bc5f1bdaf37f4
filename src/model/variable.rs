//! Model variable records and their formulas

use crate::error::Result;
use crate::evaluation::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Position of a variable in declaration order
///
/// Also the node index of the variable in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId(pub(crate) usize);

impl VariableId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Declared kind of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Computed once, no period argument
    Constant,
    /// Computed per period `t`
    TimeIndexed,
    /// Computed for the whole horizon in one call
    Array,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariableKind::Constant => "constant",
            VariableKind::TimeIndexed => "time_indexed",
            VariableKind::Array => "array",
        };
        f.write_str(s)
    }
}

pub type ConstantFn = dyn Fn(&dyn Scope) -> Result<f64> + Send + Sync;
pub type PeriodFn = dyn Fn(&dyn Scope, i64) -> Result<f64> + Send + Sync;
pub type ArrayFn = dyn Fn(&dyn Scope) -> Result<Vec<f64>> + Send + Sync;

/// A variable's formula; the variant fixes the variable's kind
#[derive(Clone)]
pub enum Formula {
    Constant(Arc<ConstantFn>),
    TimeIndexed(Arc<PeriodFn>),
    Array(Arc<ArrayFn>),
}

impl Formula {
    pub fn constant<F>(f: F) -> Self
    where
        F: Fn(&dyn Scope) -> Result<f64> + Send + Sync + 'static,
    {
        Formula::Constant(Arc::new(f))
    }

    pub fn time_indexed<F>(f: F) -> Self
    where
        F: Fn(&dyn Scope, i64) -> Result<f64> + Send + Sync + 'static,
    {
        Formula::TimeIndexed(Arc::new(f))
    }

    pub fn array<F>(f: F) -> Self
    where
        F: Fn(&dyn Scope) -> Result<Vec<f64>> + Send + Sync + 'static,
    {
        Formula::Array(Arc::new(f))
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            Formula::Constant(_) => VariableKind::Constant,
            Formula::TimeIndexed(_) => VariableKind::TimeIndexed,
            Formula::Array(_) => VariableKind::Array,
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Formula::{}", self.kind())
    }
}

/// A registered model variable
#[derive(Debug, Clone)]
pub struct Variable {
    pub(crate) id: VariableId,
    pub(crate) name: String,
    pub(crate) formula: Formula,
    /// Dependencies declared by the author in addition to what probing finds
    pub(crate) declared: Vec<String>,
}

impl Variable {
    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.formula.kind()
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn declared_dependencies(&self) -> &[String] {
        &self.declared
    }
}
