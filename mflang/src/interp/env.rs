//! Environment for variable bindings
//!
//! Each scope owns a name→value map and a parallel name→declared-type map.
//! Defining a name with a type annotation validates the initial value
//! immediately; later assignments re-validate against the type recorded at
//! definition time. Environments are shared across async workers, so the
//! chain is `Arc<Mutex<_>>`.

use super::error::RuntimeError;
use super::value::Value;
use crate::types::matching::value_matches;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared reference to an environment
pub type EnvRef = Arc<Mutex<Environment>>;

/// Environment holding variable bindings and their declared types
#[derive(Debug, Default)]
pub struct Environment {
    /// Variable bindings in this scope
    bindings: HashMap<String, Value>,
    /// Declared type per binding (None when undeclared)
    types: HashMap<String, Option<String>>,
    /// Parent environment for lexical scoping
    parent: Option<EnvRef>,
}

impl Environment {
    /// Create a new global environment
    pub fn new() -> Self {
        Environment {
            bindings: HashMap::new(),
            types: HashMap::new(),
            parent: None,
        }
    }

    /// Create a new environment with a parent
    pub fn with_parent(parent: EnvRef) -> Self {
        Environment {
            bindings: HashMap::new(),
            types: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Wrap in Arc<Mutex<>>
    pub fn into_ref(self) -> EnvRef {
        Arc::new(Mutex::new(self))
    }

    /// Define a new variable in the current scope, enforcing the annotation
    /// against the initial value when one is given.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        value: Value,
        type_annotation: Option<String>,
    ) -> Result<(), RuntimeError> {
        let name = name.into();
        if let Some(annotation) = &type_annotation {
            if !value_matches(&value, Some(annotation)) {
                return Err(RuntimeError::declaration_mismatch(
                    &name,
                    annotation,
                    &value.type_name(),
                ));
            }
        }
        self.bindings.insert(name.clone(), value);
        self.types.insert(name, type_annotation);
        Ok(())
    }

    /// Define without any type annotation (builtins, receivers)
    pub fn define_untyped(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.bindings.insert(name.clone(), value);
        self.types.insert(name, None);
    }

    /// Look up a variable in the scope chain
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.lock().get(name)
        } else {
            None
        }
    }

    /// Assign to an existing variable in the scope chain, re-validating
    /// against the type recorded at definition time. Errors if the name is
    /// undefined anywhere in the chain.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.bindings.contains_key(name) {
            if let Some(Some(declared)) = self.types.get(name) {
                if !value_matches(&value, Some(declared)) {
                    return Err(RuntimeError::assignment_mismatch(
                        name,
                        declared,
                        &value.type_name(),
                    ));
                }
            }
            self.bindings.insert(name.to_string(), value);
            Ok(())
        } else if let Some(parent) = &self.parent {
            parent.lock().set(name, value)
        } else {
            Err(RuntimeError::undefined_variable(name))
        }
    }

    /// Declared type for a name, walking the chain
    pub fn declared_type(&self, name: &str) -> Option<String> {
        if let Some(ty) = self.types.get(name) {
            ty.clone()
        } else if let Some(parent) = &self.parent {
            parent.lock().declared_type(name)
        } else {
            None
        }
    }

    /// Check if a variable exists in the scope chain
    pub fn contains(&self, name: &str) -> bool {
        if self.bindings.contains_key(name) {
            true
        } else if let Some(parent) = &self.parent {
            parent.lock().contains(name)
        } else {
            false
        }
    }

    /// Names bound directly in this scope (used by the module loader to
    /// diff globals around an interpreted unit)
    pub fn local_names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    /// Every name visible from this scope, innermost first; feeds the
    /// "did you mean" suggestion on failed lookups.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = self.local_names();
        if let Some(parent) = &self.parent {
            names.extend(parent.lock().visible_names());
        }
        names
    }

    /// Number of bindings directly in this scope
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Create a child environment from a parent reference
pub fn child_env(parent: &EnvRef) -> EnvRef {
    Environment::with_parent(Arc::clone(parent)).into_ref()
}
