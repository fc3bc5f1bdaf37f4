//! Run settings
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default, so `{}` is a valid settings file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Last period evaluated by the model (default: 720)
    #[serde(default = "default_t_max")]
    pub t_max_calculation: usize,

    /// Last period written to the output (default: 720)
    /// Never beyond `t_max_calculation`
    #[serde(default = "default_t_max")]
    pub t_max_output: usize,

    /// Model-point column holding the point identifier
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Variables written to the output; `None` writes every variable
    #[serde(default)]
    pub output_variables: Option<Vec<String>>,

    /// Sum results over model points instead of writing one block per point
    #[serde(default = "default_true")]
    pub aggregate: bool,

    /// Evaluate model points in parallel
    #[serde(default = "default_true")]
    pub multiprocessing: bool,

    /// Write the per-variable diagnostic file next to the results
    #[serde(default = "default_true")]
    pub save_diagnostic: bool,
}

fn default_t_max() -> usize { 720 }
fn default_id_column() -> String { "id".to_string() }
fn default_true() -> bool { true }

impl Default for Settings {
    fn default() -> Self {
        Self {
            t_max_calculation: default_t_max(),
            t_max_output: default_t_max(),
            id_column: default_id_column(),
            output_variables: None,
            aggregate: true,
            multiprocessing: true,
            save_diagnostic: true,
        }
    }
}

impl Settings {
    /// Parse settings from JSON text and validate them
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(text).context("Failed to parse settings JSON")?;
        Ok(settings.validated())
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Override the calculation horizon, keeping the output horizon inside it
    pub fn with_t_max(mut self, t_max: usize) -> Self {
        self.t_max_calculation = t_max;
        self.validated()
    }

    /// Clamp the output horizon to the calculation horizon
    pub fn validated(mut self) -> Self {
        if self.t_max_output > self.t_max_calculation {
            log::warn!(
                "t_max_output ({}) exceeds t_max_calculation ({}); output is limited to {}",
                self.t_max_output,
                self.t_max_calculation,
                self.t_max_calculation
            );
            self.t_max_output = self.t_max_calculation;
        }
        self
    }
}
