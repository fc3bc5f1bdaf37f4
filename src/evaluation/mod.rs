//! Evaluation of a sealed model, one model point at a time
//!
//! Every model point gets its own [`Run`]: a result cache plus recursion
//! state, dropped when the run ends. Formulas see the run through the
//! [`Scope`] trait.

pub(crate) mod scope;
mod cache;
mod run;

pub use cache::ResultCache;
pub use run::Run;
pub use scope::Scope;
