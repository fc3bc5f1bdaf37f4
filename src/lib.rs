//! Cashflow Engine - Actuarial cash-flow projection over a discrete time horizon
//!
//! This library provides:
//! - A catalog of named variables (constants, per-period formulas, whole-horizon arrays)
//! - Dependency extraction, cycle detection and evaluation scheduling at seal time
//! - Per-model-point evaluation with scalar recursion or vectorized computation
//! - The backward discounting primitive used by present-value variables
//! - Model-point loading, batch runs across model points and CSV output

pub mod error;
pub mod model;
pub mod graph;
pub mod evaluation;
pub mod discount;
pub mod diagnostics;
pub mod input;
pub mod settings;
pub mod runner;
pub mod output;
pub mod models;

// Re-export commonly used types
pub use error::{ModelError, Result};
pub use model::{Horizon, Model, ModelBuilder, VariableId, VariableKind};
pub use evaluation::{Run, Scope};
pub use discount::{discount, discount_scan, DiscountCurve};
pub use diagnostics::DiagnosticRow;
pub use input::ModelPoint;
pub use settings::Settings;
pub use runner::{BatchResult, ModelRunner};
