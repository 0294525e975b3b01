//! Operator builtins.
//!
//! These are the generic counterparts of the dedicated arithmetic and
//! comparison opcodes, for callers that hold an operator as a value. Both
//! paths go through the same primitives on [`Value`], so their observable
//! behavior is identical.

use std::cmp::Ordering;

use skald_vm::{Scope, Value};

use crate::{arg, builtin};

pub fn register(scope: &mut Scope) {
    scope.define(
        "+",
        builtin("+", |vm, args| {
            let mut total = arg(args, 0);
            for value in args.iter().skip(1) {
                total = total.add(value).or_else(|e| vm.type_error(e))?;
            }
            vm.push_stack(total)
        }),
    );
    scope.define(
        "-",
        builtin("-", |vm, args| {
            let mut total = arg(args, 0);
            for value in args.iter().skip(1) {
                total = total.subtract(value).or_else(|e| vm.type_error(e))?;
            }
            vm.push_stack(total)
        }),
    );
    scope.define(
        "*",
        builtin("*", |vm, args| {
            let mut total = arg(args, 0);
            for value in args.iter().skip(1) {
                total = total.multiply(value).or_else(|e| vm.type_error(e))?;
            }
            vm.push_stack(total)
        }),
    );
    scope.define(
        "/",
        builtin("/", |vm, args| {
            let mut total = arg(args, 0);
            for value in args.iter().skip(1) {
                total = total.divide(value).or_else(|e| vm.type_error(e))?;
            }
            vm.push_stack(total)
        }),
    );
    scope.define(
        "<",
        builtin("<", |vm, args| {
            vm.push_stack(arg(args, 0).less_than(&arg(args, 1)))
        }),
    );
    scope.define(
        ">",
        builtin(">", |vm, args| {
            vm.push_stack(arg(args, 0).greater_than(&arg(args, 1)))
        }),
    );
    scope.define(
        "<=",
        builtin("<=", |vm, args| {
            let ordering = arg(args, 0).compare(&arg(args, 1));
            vm.push_stack(Value::Bool(ordering != Ordering::Greater))
        }),
    );
    scope.define(
        ">=",
        builtin(">=", |vm, args| {
            let ordering = arg(args, 0).compare(&arg(args, 1));
            vm.push_stack(Value::Bool(ordering != Ordering::Less))
        }),
    );
    scope.define(
        "==",
        builtin("==", |vm, args| {
            vm.push_stack(arg(args, 0).equals(&arg(args, 1)))
        }),
    );
    scope.define(
        "!=",
        builtin("!=", |vm, args| {
            vm.push_stack(arg(args, 0).not_equals(&arg(args, 1)))
        }),
    );
    scope.define(
        "!",
        builtin("!", |vm, args| {
            let result = arg(args, 0).not().or_else(|e| vm.type_error(e))?;
            vm.push_stack(result)
        }),
    );
}
