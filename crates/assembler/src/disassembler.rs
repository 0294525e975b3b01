//! Renders assembled functions as a readable listing.
//!
//! The listing is diagnostic output, not round-trippable source: labels
//! are interleaved at their resolved indices and nested function operands
//! are appended as their own sections.

use std::collections::BTreeMap;
use std::fmt::Write;

use skald_vm::{Function, Value};

/// Render a function and every function literal it embeds.
pub fn disassemble(function: &Function) -> String {
    let mut out = String::new();
    write_function(function, &mut out);
    out
}

fn write_function(function: &Function, out: &mut String) {
    let _ = writeln!(
        out,
        "function {}({})",
        function.name,
        function.parameters.join(", ")
    );

    // Labels sorted by index, then name, for stable output.
    let mut labels: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
    for (label, &index) in &function.labels {
        labels.entry(index).or_default().push(label);
    }
    for names in labels.values_mut() {
        names.sort_unstable();
    }

    let mut nested: Vec<&Function> = Vec::new();
    for (index, instruction) in function.instructions.iter().enumerate() {
        if let Some(names) = labels.get(&index) {
            for name in names {
                let _ = writeln!(out, "{name}");
            }
        }
        let _ = writeln!(out, "{index:>4}: {}", instruction.describe());

        match &instruction.operand {
            Some(Value::Function(f)) => nested.push(f),
            Some(Value::Array(items)) => {
                for item in items.iter() {
                    if let Value::Function(f) = item {
                        nested.push(f);
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(names) = labels.get(&function.instructions.len()) {
        for name in names {
            let _ = writeln!(out, "{name}");
        }
    }

    for f in nested {
        let _ = writeln!(out);
        write_function(f, out);
    }
}
