//! General value builtins: conversion, type inspection, comparison.

use std::cmp::Ordering;

use skald_vm::{Scope, Value};

use crate::{arg, builtin};

pub fn register(scope: &mut Scope) {
    scope.define(
        "toString",
        builtin("toString", |vm, args| {
            vm.push_stack(Value::string(&arg(args, 0).to_string()))
        }),
    );
    scope.define(
        "typeof",
        builtin("typeof", |vm, args| {
            vm.push_stack(Value::string(arg(args, 0).type_name()))
        }),
    );
    scope.define(
        "compareTo",
        builtin("compareTo", |vm, args| {
            let result = match arg(args, 0).compare(&arg(args, 1)) {
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
                Ordering::Greater => 1.0,
            };
            vm.push_stack(Value::Number(result))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use skald_vm::VirtualMachine;

    fn call(name: &str, args: &[Value]) -> Value {
        let mut scope = Scope::new("test");
        register(&mut scope);
        let callable = scope.try_get(name).unwrap();

        let mut vm = VirtualMachine::new(8);
        vm.invoke(&callable, args).unwrap();
        vm.pop_stack().unwrap()
    }

    #[test]
    fn to_string_renders_display_form() {
        assert_eq!(call("toString", &[Value::Number(5.0)]), Value::string("5"));
        assert_eq!(call("toString", &[Value::Null]), Value::string("null"));
        assert_eq!(
            call("toString", &[Value::array(vec![Value::Number(1.0)])]),
            Value::string("[1]")
        );
    }

    #[test]
    fn typeof_reports_tag() {
        assert_eq!(call("typeof", &[Value::Bool(true)]), Value::string("bool"));
        assert_eq!(
            call("typeof", &[Value::string("x")]),
            Value::string("string")
        );
    }

    #[test]
    fn compare_to_is_signed() {
        assert_eq!(
            call("compareTo", &[Value::Number(1.0), Value::Number(2.0)]),
            Value::Number(-1.0)
        );
        assert_eq!(
            call("compareTo", &[Value::Number(2.0), Value::Number(2.0)]),
            Value::Number(0.0)
        );
        assert_eq!(
            call("compareTo", &[Value::string("b"), Value::string("a")]),
            Value::Number(1.0)
        );
    }
}
