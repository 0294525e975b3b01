//! Name-to-value binding environments with parent delegation.
//!
//! Scopes form a tree: lookups fall through to the parent when a name is
//! absent locally, `define` always targets the local mapping, and `set`
//! overwrites the nearest existing binding up the chain. The engine is the
//! sole mutator; parents are reached through shared handles, never cycles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Shared-ownership handle to a scope.
pub type ScopeRef = Rc<RefCell<Scope>>;

/// A binding environment with an optional parent.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Diagnostic name, also the registry key in the engine.
    pub name: String,
    values: HashMap<String, Value>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: HashMap::new(),
            parent: None,
        }
    }

    pub fn with_parent(name: &str, parent: ScopeRef) -> Self {
        Self {
            name: name.to_string(),
            values: HashMap::new(),
            parent: Some(parent),
        }
    }

    pub fn into_ref(self) -> ScopeRef {
        Rc::new(RefCell::new(self))
    }

    /// Insert or overwrite a binding in this scope only.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Look up a name here, then up the parent chain.
    pub fn try_get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        match &self.parent {
            Some(parent) => parent.borrow().try_get(name),
            None => None,
        }
    }

    /// Overwrite the nearest existing binding of `name`, walking the
    /// parent chain. Returns false if the name is not bound anywhere.
    pub fn try_set(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().try_set(name, value),
            None => false,
        }
    }

    /// Merge another scope's bindings into this one; `other` wins on
    /// conflict.
    pub fn combine(&mut self, other: &Scope) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Iterate local bindings, in no particular order. Parents are not
    /// visited.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
