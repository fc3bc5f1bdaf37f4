//! A single model point: one row of input data evaluated in its own run

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input record for one model point
///
/// Fields are kept as text and parsed on read, so a point can carry both
/// numeric assumptions (sum assured, term) and labels (product, gender).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPoint {
    id: String,
    fields: BTreeMap<String, String>,
}

impl ModelPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Model point without any fields, for models that read no input
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Builder-style field setter
    pub fn with_field(mut self, field: impl Into<String>, value: impl ToString) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl ToString) {
        self.fields.insert(field.into(), value.to_string());
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Numeric field value
    pub fn number(&self, field: &str) -> Result<f64> {
        let raw = self
            .get(field)
            .ok_or_else(|| ModelError::UnknownInput(field.to_string()))?;
        raw.trim().parse::<f64>().map_err(|_| ModelError::InvalidInput {
            field: field.to_string(),
            value: raw.to_string(),
        })
    }

    /// Text field value
    pub fn text(&self, field: &str) -> Result<String> {
        self.get(field)
            .map(str::to_string)
            .ok_or_else(|| ModelError::UnknownInput(field.to_string()))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
