//! Object builtins, registered as properties of the `object` object.
//!
//! As with arrays, every mutation builds a new object.

use std::collections::BTreeMap;

use skald_vm::{RuntimeError, Scope, Value, VirtualMachine};

use crate::{arg, builtin};

pub fn register(scope: &mut Scope) {
    let mut ops = BTreeMap::new();

    ops.insert(
        "length".to_string(),
        builtin("object.length", |vm, args| {
            let entries = cast_object(vm, &arg(args, 0))?;
            vm.push_stack(Value::from(entries.len()))
        }),
    );
    ops.insert(
        "keys".to_string(),
        builtin("object.keys", |vm, args| {
            let entries = cast_object(vm, &arg(args, 0))?;
            let keys = entries
                .keys()
                .map(|key| Value::string(key))
                .collect::<Vec<_>>();
            vm.push_stack(Value::array(keys))
        }),
    );
    ops.insert(
        "values".to_string(),
        builtin("object.values", |vm, args| {
            let entries = cast_object(vm, &arg(args, 0))?;
            vm.push_stack(Value::array(entries.into_values().collect()))
        }),
    );
    ops.insert(
        "get".to_string(),
        builtin("object.get", |vm, args| {
            let entries = cast_object(vm, &arg(args, 0))?;
            let key = vm.cast_string(&arg(args, 1))?;
            vm.push_stack(entries.get(&key).cloned().unwrap_or(Value::Null))
        }),
    );
    ops.insert(
        "set".to_string(),
        builtin("object.set", |vm, args| {
            let mut entries = cast_object(vm, &arg(args, 0))?;
            let key = vm.cast_string(&arg(args, 1))?;
            entries.insert(key, arg(args, 2));
            vm.push_stack(Value::object(entries))
        }),
    );
    ops.insert(
        "removeKey".to_string(),
        builtin("object.removeKey", |vm, args| {
            let mut entries = cast_object(vm, &arg(args, 0))?;
            let key = vm.cast_string(&arg(args, 1))?;
            entries.remove(&key);
            vm.push_stack(Value::object(entries))
        }),
    );
    ops.insert(
        "removeValues".to_string(),
        builtin("object.removeValues", |vm, args| {
            let mut entries = cast_object(vm, &arg(args, 0))?;
            let needle = arg(args, 1);
            entries.retain(|_, value| *value != needle);
            vm.push_stack(Value::object(entries))
        }),
    );
    ops.insert(
        "contains".to_string(),
        builtin("object.contains", |vm, args| {
            let entries = cast_object(vm, &arg(args, 0))?;
            let key = vm.cast_string(&arg(args, 1))?;
            vm.push_stack(Value::Bool(entries.contains_key(&key)))
        }),
    );

    scope.define("object", Value::object(ops));
}

fn cast_object(
    vm: &VirtualMachine,
    value: &Value,
) -> Result<BTreeMap<String, Value>, RuntimeError> {
    value
        .as_object()
        .map(Clone::clone)
        .or_else(|e| vm.type_error(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use skald_vm::RuntimeErrorKind;

    fn call(name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let mut scope = Scope::new("test");
        register(&mut scope);
        let object = scope.try_get("object").unwrap();
        let callable = object.as_object().unwrap()[name].clone();

        let mut vm = VirtualMachine::new(8);
        vm.invoke(&callable, args)?;
        vm.pop_stack()
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn sample() -> Value {
        Value::object(BTreeMap::from([
            ("a".to_string(), num(1.0)),
            ("b".to_string(), num(2.0)),
        ]))
    }

    #[test]
    fn length_keys_values() {
        assert_eq!(call("length", &[sample()]).unwrap(), num(2.0));
        assert_eq!(
            call("keys", &[sample()]).unwrap(),
            Value::array(vec![Value::string("a"), Value::string("b")])
        );
        assert_eq!(
            call("values", &[sample()]).unwrap(),
            Value::array(vec![num(1.0), num(2.0)])
        );
    }

    #[test]
    fn get_missing_key_is_null() {
        assert_eq!(call("get", &[sample(), Value::string("a")]).unwrap(), num(1.0));
        assert_eq!(
            call("get", &[sample(), Value::string("zz")]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn set_is_copy_on_write() {
        let original = sample();
        let updated = call("set", &[original.clone(), Value::string("c"), num(3.0)]).unwrap();
        assert_eq!(call("length", &[updated]).unwrap(), num(3.0));
        assert_eq!(original, sample());
    }

    #[test]
    fn remove_key_is_copy_on_write() {
        let original = sample();
        let updated = call("removeKey", &[original.clone(), Value::string("a")]).unwrap();
        assert_eq!(
            call("contains", &[updated, Value::string("a")]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(original, sample());
    }

    #[test]
    fn remove_values_drops_every_match() {
        let input = Value::object(BTreeMap::from([
            ("a".to_string(), num(1.0)),
            ("b".to_string(), num(2.0)),
            ("c".to_string(), num(1.0)),
        ]));
        let updated = call("removeValues", &[input.clone(), num(1.0)]).unwrap();
        assert_eq!(
            updated,
            Value::object(BTreeMap::from([("b".to_string(), num(2.0))]))
        );
        assert_eq!(call("length", &[input]).unwrap(), num(3.0));
    }

    #[test]
    fn removing_missing_key_is_a_no_op() {
        let updated = call("removeKey", &[sample(), Value::string("zz")]).unwrap();
        assert_eq!(updated, sample());
    }

    #[test]
    fn non_object_argument_is_a_type_error() {
        let err = call("keys", &[num(1.0)]).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::TypeMismatch(_)));
    }
}
