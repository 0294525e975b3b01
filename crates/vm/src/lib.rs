//! Skald virtual machine: an embeddable, stack-based bytecode engine for a
//! small dynamically-typed scripting language.
//!
//! The engine is single-threaded and deterministic. A host assembles or
//! constructs a [`Script`], hands it to a [`VirtualMachine`], and observes
//! effects through builtin callables and the run-command hook.
//!
//! ```
//! use skald_vm::{Instruction, Function, Operator, Scope, Script, Value, VirtualMachine};
//!
//! let function = Function::new(
//!     vec![
//!         Instruction::new(Operator::Push, Value::Number(2.0)),
//!         Instruction::new(Operator::Push, Value::Number(3.0)),
//!         Instruction::bare(Operator::Add),
//!     ],
//!     vec![],
//!     Default::default(),
//!     "global",
//! );
//! let script = Script::new(function, Scope::new("global"));
//!
//! let mut vm = VirtualMachine::new(64);
//! vm.execute(&script).unwrap();
//! assert_eq!(vm.pop_stack().unwrap(), Value::Number(5.0));
//! ```

pub mod error;
pub mod execute;
pub mod function;
pub mod instruction;
pub mod machine;
pub mod operator;
pub mod scope;
pub mod script;
pub mod stack;
pub mod value;

pub use error::{RuntimeError, RuntimeErrorKind, StackTrace, TraceFrame, TypeError};
pub use function::Function;
pub use instruction::Instruction;
pub use machine::{BuiltinFn, CallFrame, RunCommandHandler, VirtualMachine};
pub use operator::{Operator, ALL_OPERATORS};
pub use scope::{Scope, ScopeRef};
pub use script::Script;
pub use stack::FixedStack;
pub use value::{BuiltinFunction, Value};

#[cfg(test)]
mod proptests {
    use std::cmp::Ordering;

    use proptest::prelude::*;

    use crate::value::Value;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<f64>().prop_map(Value::Number),
            "[a-z]{0,8}".prop_map(|s| Value::string(&s)),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::object),
            ]
        })
    }

    proptest! {
        #[test]
        fn compare_is_antisymmetric(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a.compare(&b), b.compare(&a).reverse());
        }

        #[test]
        fn compare_is_transitive(a in arb_value(), b in arb_value(), c in arb_value()) {
            let mut sorted = vec![a, b, c];
            sorted.sort_by(|x, y| x.compare(y));
            prop_assert!(sorted[0].compare(&sorted[1]) != Ordering::Greater);
            prop_assert!(sorted[1].compare(&sorted[2]) != Ordering::Greater);
            prop_assert!(sorted[0].compare(&sorted[2]) != Ordering::Greater);
        }

        #[test]
        fn compare_is_reflexive(a in arb_value()) {
            prop_assert_eq!(a.compare(&a.clone()), Ordering::Equal);
        }

        #[test]
        fn equality_consistent_with_compare(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a == b, a.compare(&b) == Ordering::Equal);
        }
    }
}
