//! Error types raised by the projection engine
//!
//! Errors are raised at the earliest phase that can detect them:
//! registration, then sealing (extraction, cycle detection, scheduling),
//! then evaluation. None of them are retried or downgraded.

use thiserror::Error;

/// Errors produced while building, sealing or evaluating a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Two registrations share a name
    #[error("variable '{0}' is already registered")]
    DuplicateVariable(String),

    /// Registration attempted after the catalog was sealed
    #[error("catalog is sealed, cannot register '{0}'")]
    CatalogSealed(String),

    /// A formula, declaration or query names a variable outside the catalog
    #[error("unknown variable '{name}'{}", referenced_suffix(.referenced_by))]
    UnknownVariable {
        name: String,
        referenced_by: Option<String>,
    },

    /// A variable declared as `array` belongs to a dependency cycle
    #[error("array variable '{variable}' is part of the cycle [{}]", .cycle.join(", "))]
    ArrayCycleConflict { variable: String, cycle: Vec<String> },

    /// An array result or a discount input does not have the expected length
    #[error("'{context}' has length {actual}, expected {expected}")]
    ArrayLengthMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Scalar recursion re-entered a period in progress or ran past the horizon depth
    #[error("recursion limit reached while evaluating '{variable}' at t={period}")]
    RecursionLimit { variable: String, period: usize },

    /// A query asked for a period outside `[0, t_max]`
    #[error("period {period} of '{variable}' is outside the horizon [0, {t_max}]")]
    PeriodOutOfRange {
        variable: String,
        period: i64,
        t_max: usize,
    },

    /// A formula read a model-point field that is not present
    #[error("model point has no field '{0}'")]
    UnknownInput(String),

    /// A model-point field could not be read as a number
    #[error("model point field '{field}' is not numeric: '{value}'")]
    InvalidInput { field: String, value: String },

    /// Raised by a formula author
    #[error("formula '{variable}' failed: {message}")]
    Formula { variable: String, message: String },
}

impl ModelError {
    /// Convenience constructor for author-raised formula failures
    pub fn formula(variable: impl Into<String>, message: impl Into<String>) -> Self {
        ModelError::Formula {
            variable: variable.into(),
            message: message.into(),
        }
    }

    /// Whether the error reflects the model structure (and so must abort a seal)
    /// rather than data seen by one particular evaluation.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ModelError::DuplicateVariable(_)
                | ModelError::CatalogSealed(_)
                | ModelError::UnknownVariable { .. }
                | ModelError::ArrayCycleConflict { .. }
        )
    }
}

fn referenced_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(caller) => format!(" (referenced by '{}')", caller),
        None => String::new(),
    }
}

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variable_message() {
        let err = ModelError::UnknownVariable {
            name: "lapse".into(),
            referenced_by: Some("reserve".into()),
        };
        assert_eq!(
            err.to_string(),
            "unknown variable 'lapse' (referenced by 'reserve')"
        );

        let bare = ModelError::UnknownVariable {
            name: "lapse".into(),
            referenced_by: None,
        };
        assert_eq!(bare.to_string(), "unknown variable 'lapse'");
    }

    #[test]
    fn test_structural_classification() {
        assert!(ModelError::DuplicateVariable("a".into()).is_structural());
        assert!(!ModelError::RecursionLimit {
            variable: "a".into(),
            period: 3
        }
        .is_structural());
        assert!(!ModelError::formula("a", "boom").is_structural());
    }
}
