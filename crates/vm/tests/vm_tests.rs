//! End-to-end engine tests exercising the public API only.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use skald_vm::{
    Function, Instruction, Operator, RuntimeErrorKind, Scope, Script, Value, VirtualMachine,
};

fn num(n: f64) -> Value {
    Value::Number(n)
}

fn push(n: f64) -> Instruction {
    Instruction::new(Operator::Push, num(n))
}

fn script_of(instructions: Vec<Instruction>) -> Script {
    Script::new(
        Function::new(instructions, vec![], HashMap::new(), "global"),
        Scope::new("global"),
    )
}

#[test]
fn counter_loop_accumulates_and_runs_command() {
    // total = 0; counter = 0;
    // while counter < 5 { total += counter; counter += 1 }
    // run "done" with total on the stack
    let instructions = vec![
        push(0.0),
        Instruction::new(Operator::Define, Value::string("total")),
        push(0.0),
        Instruction::new(Operator::Define, Value::string("counter")),
        // :loop (index 4)
        Instruction::new(Operator::Get, Value::string("counter")),
        Instruction::new(Operator::LessThan, num(5.0)),
        Instruction::new(Operator::JumpFalse, Value::string(":done")),
        Instruction::new(Operator::Get, Value::string("counter")),
        Instruction::new(Operator::AddTo, Value::string("total")),
        Instruction::new(Operator::Inc, Value::string("counter")),
        Instruction::new(Operator::Jump, Value::string(":loop")),
        // :done (index 11)
        Instruction::new(Operator::Get, Value::string("total")),
        Instruction::bare(Operator::Run),
    ];
    let labels = HashMap::from([(":loop".to_string(), 4), (":done".to_string(), 11)]);
    let script = Script::new(
        Function::new(instructions, vec![], labels, "global"),
        Scope::new("global"),
    );

    let commands: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = commands.clone();

    let mut vm = VirtualMachine::new(64);
    vm.on_run_command(move |command, _vm| {
        sink.borrow_mut().push(command);
        Ok(())
    });
    vm.execute(&script).unwrap();

    // 0 + 1 + 2 + 3 + 4
    assert_eq!(&*commands.borrow(), &[num(10.0)]);
    assert_eq!(vm.stack_len(), 0);
}

#[test]
fn less_than_leaves_single_bool() {
    let mut vm = VirtualMachine::new(8);
    vm.execute(&script_of(vec![
        push(5.0),
        push(3.0),
        Instruction::bare(Operator::LessThan),
    ]))
    .unwrap();

    assert_eq!(vm.stack_len(), 1);
    assert_eq!(vm.pop_stack().unwrap(), Value::Bool(false));
}

#[test]
fn empty_function_call_restores_caller() {
    let noop = Value::from(Function::empty("noop"));
    let mut vm = VirtualMachine::new(8);
    vm.execute(&script_of(vec![
        Instruction::new(
            Operator::CallDirect,
            Value::array(vec![noop, num(0.0)]),
        ),
        push(9.0),
    ]))
    .unwrap();

    // Fall-through past the empty body returned into the caller.
    assert_eq!(vm.call_depth(), 0);
    assert_eq!(vm.pop_stack().unwrap(), num(9.0));
}

#[test]
fn typed_pop_failure_leaves_stack_intact() {
    let mut vm = VirtualMachine::new(8);
    vm.execute(&script_of(vec![Instruction::new(
        Operator::Push,
        Value::string("five"),
    )]))
    .unwrap();

    let err = vm.pop_stack_number().unwrap_err();
    assert!(matches!(err.kind, RuntimeErrorKind::TypeMismatch(_)));
    assert_eq!(vm.stack_len(), 1);
    assert_eq!(vm.pop_stack().unwrap(), Value::string("five"));
}

#[test]
fn stop_from_builtin_is_resumable_with_frames_intact() {
    // Nested calls two deep, then the run-command hook stops the engine.
    // The call stack must still be two deep and a later run must finish.
    let inner = Function::new(
        vec![
            Instruction::new(Operator::Run, Value::string("pause-here")),
            push(3.0),
            Instruction::bare(Operator::Return),
        ],
        vec![],
        HashMap::new(),
        "inner",
    );
    let outer = Function::new(
        vec![
            Instruction::new(
                Operator::CallDirect,
                Value::array(vec![Value::from(inner), num(0.0)]),
            ),
            push(2.0),
            Instruction::bare(Operator::Return),
        ],
        vec![],
        HashMap::new(),
        "outer",
    );
    let script = script_of(vec![
        Instruction::new(
            Operator::CallDirect,
            Value::array(vec![Value::from(outer), num(0.0)]),
        ),
        push(1.0),
    ]);

    let mut vm = VirtualMachine::new(16);
    vm.on_run_command(|_, vm| {
        vm.stop();
        Ok(())
    });

    vm.execute(&script).unwrap();
    assert!(!vm.is_running());
    assert_eq!(vm.call_depth(), 2);

    // Resume; the engine picks up right after the run instruction.
    vm.run(None).unwrap();
    assert_eq!(vm.call_depth(), 0);
    assert_eq!(vm.pop_stack().unwrap(), num(1.0));
    assert_eq!(vm.pop_stack().unwrap(), num(2.0));
    assert_eq!(vm.pop_stack().unwrap(), num(3.0));
}

#[test]
fn pause_from_builtin_exits_run_loop() {
    let mut vm = VirtualMachine::new(16);
    vm.on_run_command(|_, vm| {
        vm.set_pause(true);
        Ok(())
    });
    vm.execute(&script_of(vec![
        Instruction::new(Operator::Run, Value::string("wait")),
        push(1.0),
    ]))
    .unwrap();

    // Still running, just paused before the next instruction.
    assert!(vm.is_running());
    assert!(vm.is_paused());
    assert_eq!(vm.stack_len(), 0);

    vm.run(None).unwrap();
    assert_eq!(vm.pop_stack().unwrap(), num(1.0));
}

#[test]
fn fast_and_generic_arithmetic_agree() {
    let operator_builtin = |name: &'static str| {
        Value::Builtin(skald_vm::BuiltinFunction::new(
            name,
            Rc::new(move |vm: &mut VirtualMachine, args: &[Value]| {
                let result = match name {
                    "+" => args[0].add(&args[1]),
                    "-" => args[0].subtract(&args[1]),
                    "*" => args[0].multiply(&args[1]),
                    _ => args[0].divide(&args[1]),
                };
                match result {
                    Ok(value) => vm.push_stack(value),
                    Err(e) => vm.type_error(e),
                }
            }),
        ))
    };

    let cases = [
        (Operator::Add, "+", 9.0, 4.0),
        (Operator::Subtract, "-", 9.0, 4.0),
        (Operator::Multiply, "*", 9.0, 4.0),
        (Operator::Divide, "/", 9.0, 4.0),
    ];
    for (opcode, name, a, b) in cases {
        let mut fast = VirtualMachine::new(8);
        fast.execute(&script_of(vec![
            push(a),
            push(b),
            Instruction::bare(opcode),
        ]))
        .unwrap();

        let mut generic = VirtualMachine::new(8);
        generic.execute(&script_of(vec![
            push(a),
            push(b),
            Instruction::new(
                Operator::CallDirect,
                Value::array(vec![operator_builtin(name), num(2.0)]),
            ),
        ]))
        .unwrap();

        assert_eq!(
            fast.pop_stack().unwrap(),
            generic.pop_stack().unwrap(),
            "dispatch paths disagree for {name}",
        );
    }
}

#[test]
fn nested_call_error_reports_full_trace() {
    let inner = Function::new(
        vec![Instruction::bare(Operator::Add)],
        vec![],
        HashMap::new(),
        "inner",
    );
    let outer = Function::new(
        vec![Instruction::new(
            Operator::CallDirect,
            Value::array(vec![Value::from(inner), num(0.0)]),
        )],
        vec![],
        HashMap::new(),
        "outer",
    );
    let script = script_of(vec![Instruction::new(
        Operator::CallDirect,
        Value::array(vec![Value::from(outer), num(0.0)]),
    )]);

    let mut vm = VirtualMachine::new(16);
    let err = vm.execute(&script).unwrap_err();

    assert_eq!(err.kind, RuntimeErrorKind::StackUnderflow);
    let functions: Vec<&str> = err
        .trace
        .frames
        .iter()
        .map(|f| f.function.as_str())
        .collect();
    assert_eq!(functions, vec!["inner", "outer", "global"]);
    assert_eq!(err.trace.frames[0].description, "add: [<empty>]");
}

#[test]
fn parameters_bind_in_call_order() {
    let pair = Function::new(
        vec![
            Instruction::new(Operator::Get, Value::string("first")),
            Instruction::new(Operator::Get, Value::string("second")),
            Instruction::bare(Operator::Subtract),
            Instruction::bare(Operator::Return),
        ],
        vec!["first".to_string(), "second".to_string()],
        HashMap::new(),
        "sub",
    );
    let mut vm = VirtualMachine::new(16);
    vm.execute(&script_of(vec![
        push(10.0),
        push(3.0),
        Instruction::new(
            Operator::CallDirect,
            Value::array(vec![Value::from(pair), num(2.0)]),
        ),
    ]))
    .unwrap();
    assert_eq!(vm.pop_stack().unwrap(), num(7.0));
}

#[test]
fn callee_scope_reads_caller_chain_but_defines_locally() {
    let callee = Function::new(
        vec![
            // Reads the global, then shadows it locally.
            Instruction::new(Operator::Get, Value::string("shared")),
            push(99.0),
            Instruction::new(Operator::Define, Value::string("shared")),
            Instruction::bare(Operator::Return),
        ],
        vec![],
        HashMap::new(),
        "callee",
    );
    let mut scope = Scope::new("global");
    scope.define("shared", num(7.0));
    let script = Script::new(
        Function::new(
            vec![
                Instruction::new(
                    Operator::CallDirect,
                    Value::array(vec![Value::from(callee), num(0.0)]),
                ),
                Instruction::new(Operator::Get, Value::string("shared")),
            ],
            vec![],
            HashMap::new(),
            "global",
        ),
        scope,
    );

    let mut vm = VirtualMachine::new(16);
    vm.execute(&script).unwrap();

    // The local define did not leak into the caller's scope.
    assert_eq!(vm.pop_stack().unwrap(), num(7.0));
    assert_eq!(vm.pop_stack().unwrap(), num(7.0));
}

#[test]
fn deep_recursion_overflows_call_stack() {
    // :start calls itself forever.
    let labels = HashMap::from([(":start".to_string(), 0)]);
    let script = Script::new(
        Function::new(
            vec![Instruction::new(Operator::Call, Value::string(":start"))],
            vec![],
            labels,
            "global",
        ),
        Scope::new("global"),
    );

    let mut vm = VirtualMachine::new(32);
    let err = vm.execute(&script).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::CallStackOverflow);
}

#[test]
fn builtin_can_call_back_into_engine() {
    // A builtin that invokes a script function value handed to it.
    let double = Value::from(Function::new(
        vec![
            Instruction::new(Operator::Get, Value::string("n")),
            Instruction::new(Operator::Multiply, num(2.0)),
            Instruction::bare(Operator::Return),
        ],
        vec!["n".to_string()],
        HashMap::new(),
        "double",
    ));
    let apply = Value::Builtin(skald_vm::BuiltinFunction::new(
        "apply",
        Rc::new(|vm: &mut VirtualMachine, args: &[Value]| {
            vm.invoke(&args[0], &args[1..])
        }),
    ));

    let mut vm = VirtualMachine::new(16);
    vm.execute(&script_of(vec![
        Instruction::new(Operator::Push, apply),
        Instruction::new(Operator::Push, double),
        push(21.0),
        Instruction::new(Operator::Call, num(2.0)),
    ]))
    .unwrap();
    assert_eq!(vm.pop_stack().unwrap(), num(42.0));
}
