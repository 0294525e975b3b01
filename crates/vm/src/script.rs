//! The unit the assembler hands to the engine.

use std::rc::Rc;

use crate::function::Function;
use crate::scope::{Scope, ScopeRef};

/// An assembled entry function plus its initial global scope.
///
/// The scope holds the bindings produced by top-level `define` forms; the
/// host may add to it before execution.
#[derive(Debug, Clone)]
pub struct Script {
    pub function: Rc<Function>,
    pub scope: ScopeRef,
}

impl Script {
    pub fn new(function: Function, scope: Scope) -> Self {
        Self {
            function: Rc::new(function),
            scope: scope.into_ref(),
        }
    }
}
