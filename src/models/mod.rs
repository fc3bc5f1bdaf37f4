//! Bundled models
//!
//! Ready-made models used by the command-line runner and as worked examples
//! of the builder API.

pub mod endowment;
