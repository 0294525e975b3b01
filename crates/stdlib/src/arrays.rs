//! Array builtins, registered as properties of the `array` object.
//!
//! Every mutation builds a new array; the input is shared, never changed.

use std::collections::BTreeMap;

use skald_vm::{RuntimeError, RuntimeErrorKind, Scope, Value, VirtualMachine};

use crate::{arg, builtin};

pub fn register(scope: &mut Scope) {
    let mut ops = BTreeMap::new();

    ops.insert(
        "length".to_string(),
        builtin("array.length", |vm, args| {
            let items = cast_array(vm, &arg(args, 0))?;
            vm.push_stack(Value::from(items.len()))
        }),
    );
    ops.insert(
        "get".to_string(),
        builtin("array.get", |vm, args| {
            let items = cast_array(vm, &arg(args, 0))?;
            let index = vm.cast_index(&arg(args, 1))?;
            match items.get(index) {
                Some(value) => vm.push_stack(value.clone()),
                None => Err(vm.error(RuntimeErrorKind::InvalidOffset(index))),
            }
        }),
    );
    ops.insert(
        "set".to_string(),
        builtin("array.set", |vm, args| {
            let mut items = cast_array(vm, &arg(args, 0))?;
            let index = vm.cast_index(&arg(args, 1))?;
            if index >= items.len() {
                return Err(vm.error(RuntimeErrorKind::InvalidOffset(index)));
            }
            items[index] = arg(args, 2);
            vm.push_stack(Value::array(items))
        }),
    );
    ops.insert(
        "push".to_string(),
        builtin("array.push", |vm, args| {
            let mut items = cast_array(vm, &arg(args, 0))?;
            items.extend(args.iter().skip(1).cloned());
            vm.push_stack(Value::array(items))
        }),
    );
    ops.insert(
        "insert".to_string(),
        builtin("array.insert", |vm, args| {
            let mut items = cast_array(vm, &arg(args, 0))?;
            let index = vm.cast_index(&arg(args, 1))?;
            if index > items.len() {
                return Err(vm.error(RuntimeErrorKind::InvalidOffset(index)));
            }
            items.insert(index, arg(args, 2));
            vm.push_stack(Value::array(items))
        }),
    );
    ops.insert(
        "removeAt".to_string(),
        builtin("array.removeAt", |vm, args| {
            let mut items = cast_array(vm, &arg(args, 0))?;
            let index = vm.cast_index(&arg(args, 1))?;
            if index >= items.len() {
                return Err(vm.error(RuntimeErrorKind::InvalidOffset(index)));
            }
            items.remove(index);
            vm.push_stack(Value::array(items))
        }),
    );
    ops.insert(
        "remove".to_string(),
        builtin("array.remove", |vm, args| {
            let mut items = cast_array(vm, &arg(args, 0))?;
            let needle = arg(args, 1);
            if let Some(index) = items.iter().position(|item| *item == needle) {
                items.remove(index);
            }
            vm.push_stack(Value::array(items))
        }),
    );
    ops.insert(
        "sublist".to_string(),
        builtin("array.sublist", |vm, args| {
            let items = cast_array(vm, &arg(args, 0))?;
            let start = vm.cast_index(&arg(args, 1))?;
            if start > items.len() {
                return Err(vm.error(RuntimeErrorKind::InvalidOffset(start)));
            }
            let end = match args.get(2) {
                Some(length) => (start + vm.cast_index(length)?).min(items.len()),
                None => items.len(),
            };
            vm.push_stack(Value::array(items[start..end].to_vec()))
        }),
    );
    ops.insert(
        "indexOf".to_string(),
        builtin("array.indexOf", |vm, args| {
            let items = cast_array(vm, &arg(args, 0))?;
            let needle = arg(args, 1);
            let index = items
                .iter()
                .position(|item| *item == needle)
                .map(|i| i as f64)
                .unwrap_or(-1.0);
            vm.push_stack(Value::Number(index))
        }),
    );
    ops.insert(
        "contains".to_string(),
        builtin("array.contains", |vm, args| {
            let items = cast_array(vm, &arg(args, 0))?;
            let needle = arg(args, 1);
            vm.push_stack(Value::Bool(items.contains(&needle)))
        }),
    );

    scope.define("array", Value::object(ops));
}

fn cast_array(vm: &VirtualMachine, value: &Value) -> Result<Vec<Value>, RuntimeError> {
    value
        .as_array()
        .map(<[Value]>::to_vec)
        .or_else(|e| vm.type_error(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let mut scope = Scope::new("test");
        register(&mut scope);
        let object = scope.try_get("array").unwrap();
        let callable = object.as_object().unwrap()[name].clone();

        let mut vm = VirtualMachine::new(8);
        vm.invoke(&callable, args)?;
        vm.pop_stack()
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn sample() -> Value {
        Value::array(vec![num(1.0), num(2.0), num(3.0)])
    }

    #[test]
    fn length_and_get() {
        assert_eq!(call("length", &[sample()]).unwrap(), num(3.0));
        assert_eq!(call("get", &[sample(), num(1.0)]).unwrap(), num(2.0));
    }

    #[test]
    fn get_out_of_range() {
        let err = call("get", &[sample(), num(9.0)]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::InvalidOffset(9));
    }

    #[test]
    fn set_is_copy_on_write() {
        let original = sample();
        let updated = call("set", &[original.clone(), num(0.0), num(9.0)]).unwrap();
        assert_eq!(updated, Value::array(vec![num(9.0), num(2.0), num(3.0)]));
        // The original is untouched.
        assert_eq!(original, sample());
    }

    #[test]
    fn push_appends_all() {
        let updated = call("push", &[sample(), num(4.0), num(5.0)]).unwrap();
        assert_eq!(
            updated,
            Value::array(vec![num(1.0), num(2.0), num(3.0), num(4.0), num(5.0)])
        );
    }

    #[test]
    fn insert_and_remove() {
        let inserted = call("insert", &[sample(), num(1.0), num(9.0)]).unwrap();
        assert_eq!(
            inserted,
            Value::array(vec![num(1.0), num(9.0), num(2.0), num(3.0)])
        );
        let removed = call("removeAt", &[sample(), num(0.0)]).unwrap();
        assert_eq!(removed, Value::array(vec![num(2.0), num(3.0)]));
    }

    #[test]
    fn insert_at_end_is_allowed() {
        let updated = call("insert", &[sample(), num(3.0), num(4.0)]).unwrap();
        assert_eq!(
            updated,
            Value::array(vec![num(1.0), num(2.0), num(3.0), num(4.0)])
        );
    }

    #[test]
    fn remove_drops_first_occurrence_only() {
        let input = Value::array(vec![num(1.0), num(2.0), num(1.0)]);
        let removed = call("remove", &[input.clone(), num(1.0)]).unwrap();
        assert_eq!(removed, Value::array(vec![num(2.0), num(1.0)]));
        // A missing value leaves the contents unchanged.
        let unchanged = call("remove", &[input, num(9.0)]).unwrap();
        assert_eq!(
            unchanged,
            Value::array(vec![num(1.0), num(2.0), num(1.0)])
        );
    }

    #[test]
    fn sublist_clamps_to_the_end() {
        assert_eq!(
            call("sublist", &[sample(), num(1.0)]).unwrap(),
            Value::array(vec![num(2.0), num(3.0)])
        );
        assert_eq!(
            call("sublist", &[sample(), num(1.0), num(1.0)]).unwrap(),
            Value::array(vec![num(2.0)])
        );
        assert_eq!(
            call("sublist", &[sample(), num(2.0), num(9.0)]).unwrap(),
            Value::array(vec![num(3.0)])
        );
        let err = call("sublist", &[sample(), num(4.0)]).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::InvalidOffset(4));
    }

    #[test]
    fn index_of_and_contains() {
        assert_eq!(call("indexOf", &[sample(), num(3.0)]).unwrap(), num(2.0));
        assert_eq!(call("indexOf", &[sample(), num(9.0)]).unwrap(), num(-1.0));
        assert_eq!(
            call("contains", &[sample(), num(2.0)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn non_array_argument_is_a_type_error() {
        let err = call("length", &[num(1.0)]).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::TypeMismatch(_)));
    }
}
