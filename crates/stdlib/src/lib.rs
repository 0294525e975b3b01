//! Standard library scopes for the Skald virtual machine.
//!
//! Each module registers builtin callables into a [`Scope`]; the host
//! hands the combined scope to both the assembler (for the `callDirect`
//! optimization and dotted property paths) and the engine (as the builtin
//! fallback scope). Collection builtins are grouped as properties of an
//! `array`/`object` value, reached from source as `array.push`,
//! `object.keys`, and so on.
//!
//! All collection operations are copy-on-write: the input value is never
//! changed, the result is a new value.

pub mod arrays;
pub mod objects;
pub mod operators;
pub mod values;

use std::rc::Rc;

use skald_vm::{BuiltinFunction, RuntimeError, Scope, Value, VirtualMachine};

/// The full standard scope: value, operator, array, and object builtins.
pub fn standard_scope() -> Scope {
    let mut scope = Scope::new("std");
    values::register(&mut scope);
    operators::register(&mut scope);
    arrays::register(&mut scope);
    objects::register(&mut scope);
    scope
}

/// Wrap a closure as a builtin value.
pub fn builtin<F>(name: &str, func: F) -> Value
where
    F: Fn(&mut VirtualMachine, &[Value]) -> Result<(), RuntimeError> + 'static,
{
    Value::Builtin(BuiltinFunction::new(name, Rc::new(func)))
}

/// Argument by position; missing arguments read as null.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_scope_has_all_groups() {
        let scope = standard_scope();
        assert!(scope.try_get("toString").is_some());
        assert!(scope.try_get("+").is_some());
        assert!(scope.try_get("array").is_some());
        assert!(scope.try_get("object").is_some());
    }

    #[test]
    fn missing_arg_is_null() {
        assert_eq!(arg(&[], 0), Value::Null);
        assert_eq!(arg(&[Value::Number(1.0)], 0), Value::Number(1.0));
        assert_eq!(arg(&[Value::Number(1.0)], 3), Value::Null);
    }
}
