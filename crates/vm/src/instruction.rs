//! Instruction representation: one operator plus an optional literal operand.
//!
//! The operand is either embedded data (a push value, a resolved jump
//! index, a `[callable, argCount]` pair) or absent, in which case the
//! engine takes the value from the operand stack at execution time.

use std::fmt;

use crate::operator::Operator;
use crate::value::Value;

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation to perform.
    pub operator: Operator,
    /// Embedded literal operand, if any.
    pub operand: Option<Value>,
}

impl Instruction {
    /// An instruction with an embedded operand.
    pub fn new(operator: Operator, operand: Value) -> Self {
        Self {
            operator,
            operand: Some(operand),
        }
    }

    /// An instruction whose operand, if needed, comes from the stack.
    pub fn bare(operator: Operator) -> Self {
        Self {
            operator,
            operand: None,
        }
    }

    /// `operator: [operand]` form used in stack traces and listings.
    pub fn describe(&self) -> String {
        match &self.operand {
            Some(value) => format!("{}: [{}]", self.operator, value.serialise()),
            None => format!("{}: [<empty>]", self.operator),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_with_operand() {
        let instr = Instruction::new(Operator::Push, Value::Number(5.0));
        assert_eq!(instr.describe(), "push: [5]");
    }

    #[test]
    fn describe_quotes_string_operands() {
        let instr = Instruction::new(Operator::Get, Value::string("counter"));
        assert_eq!(instr.describe(), "get: [\"counter\"]");
    }

    #[test]
    fn describe_without_operand() {
        let instr = Instruction::bare(Operator::Add);
        assert_eq!(instr.describe(), "add: [<empty>]");
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(
            Instruction::new(Operator::Push, Value::Number(1.0)),
            Instruction::new(Operator::Push, Value::Number(1.0))
        );
        assert_ne!(
            Instruction::new(Operator::Push, Value::Number(1.0)),
            Instruction::bare(Operator::Push)
        );
    }
}
