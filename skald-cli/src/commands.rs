//! CLI command implementations.

use std::fs;

use skald_assembler::{disassemble, Assembler};
use skald_stdlib::{builtin, standard_scope};
use skald_vm::{Scope, Script, Value, VirtualMachine};

const DEFAULT_STACK_SIZE: usize = 256;

/// The standard scope plus CLI-only builtins.
fn host_scope() -> Scope {
    let mut scope = standard_scope();
    scope.define(
        "print",
        builtin("print", |_vm, args| {
            let line = args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
            Ok(())
        }),
    );
    scope
}

fn load(input: &str) -> Result<Script, i32> {
    let text = fs::read_to_string(input).map_err(|e| {
        eprintln!("error: cannot read '{input}': {e}");
        1
    })?;
    Assembler::with_builtins(host_scope())
        .assemble(&text)
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })
}

/// Assemble and execute a script file.
pub fn run(args: &[String]) -> Result<(), i32> {
    let mut input = None;
    let mut stack_size = DEFAULT_STACK_SIZE;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--stack-size" => {
                let value = iter.next().ok_or_else(|| {
                    eprintln!("error: --stack-size requires a value");
                    1
                })?;
                stack_size = value.parse().map_err(|_| {
                    eprintln!("error: invalid stack size '{value}'");
                    1
                })?;
            }
            _ if input.is_none() => input = Some(arg.as_str()),
            other => {
                eprintln!("error: unexpected argument '{other}'");
                return Err(1);
            }
        }
    }

    let Some(input) = input else {
        eprintln!("error: run requires an input file");
        eprintln!("Usage: skald run [--stack-size N] <script.skd>");
        return Err(1);
    };
    let script = load(input)?;

    let mut vm = VirtualMachine::new(stack_size);
    vm.set_builtin_scope(host_scope());
    vm.on_run_command(|command, _vm| {
        println!("{command}");
        Ok(())
    });

    vm.execute(&script).map_err(|e| {
        eprintln!("runtime error: {e}");
        3
    })
}

/// Assemble a script file and print its bytecode listing, including
/// hoisted top-level functions.
pub fn dis(args: &[String]) -> Result<(), i32> {
    if args.is_empty() {
        eprintln!("error: dis requires an input file");
        eprintln!("Usage: skald dis <script.skd>");
        return Err(1);
    }

    let script = load(&args[0])?;
    print!("{}", disassemble(&script.function));

    let scope = script.scope.borrow();
    let mut hoisted: Vec<_> = scope
        .iter()
        .filter_map(|(name, value)| match value {
            Value::Function(f) => Some((name.clone(), f.clone())),
            _ => None,
        })
        .collect();
    hoisted.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, function) in hoisted {
        println!();
        print!("{}", disassemble(&function));
    }
    Ok(())
}
