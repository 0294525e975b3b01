//! Assembled function bodies.

use std::collections::HashMap;

use crate::instruction::Instruction;

/// An immutable unit of assembled code.
///
/// The label table is fully resolved at assembly time and maps label names
/// (including the leading `:`) to instruction indices within this function
/// only. Call frames hold an `Rc<Function>` handle, never a copy.
#[derive(Debug, Clone, Default)]
pub struct Function {
    /// Ordered instruction sequence.
    pub instructions: Vec<Instruction>,
    /// Ordered parameter names, bound from call arguments.
    pub parameters: Vec<String>,
    /// Label name to instruction index, intra-function only.
    pub labels: HashMap<String, usize>,
    /// Display name for diagnostics and stack traces.
    pub name: String,
}

impl Function {
    pub fn new(
        instructions: Vec<Instruction>,
        parameters: Vec<String>,
        labels: HashMap<String, usize>,
        name: &str,
    ) -> Self {
        Self {
            instructions,
            parameters,
            labels,
            name: name.to_string(),
        }
    }

    /// A function with no instructions, used as a placeholder and in tests.
    pub fn empty(name: &str) -> Self {
        Self {
            instructions: Vec::new(),
            parameters: Vec::new(),
            labels: HashMap::new(),
            name: name.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
