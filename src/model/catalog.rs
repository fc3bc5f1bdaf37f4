//! Variable catalog: the registry of declared model variables
//!
//! Variables are registered in declaration order while a model is being
//! defined. Once sealed the catalog only hands out shared references.

use super::variable::{Formula, Variable, VariableId, VariableKind};
use crate::error::{ModelError, Result};
use std::collections::HashMap;

/// Registry of model variables, indexed by name and by declaration order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    variables: Vec<Variable>,
    index: HashMap<String, VariableId>,
    sealed: bool,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable. The formula variant determines its kind.
    pub fn register(&mut self, name: &str, formula: Formula) -> Result<VariableId> {
        if self.sealed {
            return Err(ModelError::CatalogSealed(name.to_string()));
        }
        if self.index.contains_key(name) {
            return Err(ModelError::DuplicateVariable(name.to_string()));
        }

        let id = VariableId(self.variables.len());
        self.variables.push(Variable {
            id,
            name: name.to_string(),
            formula,
            declared: Vec::new(),
        });
        self.index.insert(name.to_string(), id);

        log::debug!("Registered variable '{}' as {:?}", name, id);
        Ok(id)
    }

    /// Attach statically declared dependencies to an already registered variable
    ///
    /// Names are resolved when the catalog is sealed, so a declaration may
    /// point at a variable registered later.
    pub fn declare_dependencies(&mut self, name: &str, dependencies: &[&str]) -> Result<()> {
        if self.sealed {
            return Err(ModelError::CatalogSealed(name.to_string()));
        }
        let id = self.lookup(name).ok_or_else(|| ModelError::UnknownVariable {
            name: name.to_string(),
            referenced_by: None,
        })?;

        let declared = &mut self.variables[id.0].declared;
        for dep in dependencies {
            if !declared.iter().any(|d| d == dep) {
                declared.push(dep.to_string());
            }
        }
        Ok(())
    }

    /// Make the catalog read-only
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn lookup(&self, name: &str) -> Option<VariableId> {
        self.index.get(name).copied()
    }

    /// Resolve a name, reporting who asked for it when it is missing
    pub fn resolve(&self, name: &str, referenced_by: Option<&str>) -> Result<VariableId> {
        self.lookup(name).ok_or_else(|| ModelError::UnknownVariable {
            name: name.to_string(),
            referenced_by: referenced_by.map(str::to_string),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.lookup(name).map(|id| &self.variables[id.0])
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn name(&self, id: VariableId) -> &str {
        &self.variables[id.0].name
    }

    pub fn kind(&self, id: VariableId) -> VariableKind {
        self.variables[id.0].kind()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero() -> Formula {
        Formula::constant(|_| Ok(0.0))
    }

    #[test]
    fn test_register_in_declaration_order() {
        let mut catalog = Catalog::new();
        let a = catalog.register("a", zero()).unwrap();
        let b = catalog
            .register("b", Formula::time_indexed(|_, t| Ok(t as f64)))
            .unwrap();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(catalog.kind(b), VariableKind::TimeIndexed);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut catalog = Catalog::new();
        catalog.register("premium", zero()).unwrap();
        let err = catalog.register("premium", zero()).unwrap_err();
        assert_eq!(err, ModelError::DuplicateVariable("premium".into()));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_register_after_seal_fails() {
        let mut catalog = Catalog::new();
        catalog.register("a", zero()).unwrap();
        catalog.seal();

        assert!(matches!(
            catalog.register("b", zero()),
            Err(ModelError::CatalogSealed(_))
        ));
        assert!(matches!(
            catalog.declare_dependencies("a", &["b"]),
            Err(ModelError::CatalogSealed(_))
        ));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_declared_dependencies_deduplicated() {
        let mut catalog = Catalog::new();
        catalog.register("a", zero()).unwrap();
        catalog.declare_dependencies("a", &["b", "c"]).unwrap();
        catalog.declare_dependencies("a", &["b"]).unwrap();

        assert_eq!(catalog.get("a").unwrap().declared_dependencies(), &["b", "c"]);
        assert!(catalog.declare_dependencies("missing", &["a"]).is_err());
    }
}
