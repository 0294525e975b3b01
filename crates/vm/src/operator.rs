//! Operator definitions for the Skald instruction set.
//!
//! This is the extended opcode set: beyond the control-flow core, the
//! hottest operations (variable read-modify-write, arithmetic, comparison,
//! statically-resolved calls) are promoted to dedicated opcodes so hot
//! loops avoid the scope-lookup and call-frame overhead of generic builtin
//! dispatch. Both paths must stay observably identical.

use std::fmt;

/// Identifies one atomic bytecode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Push the instruction's literal operand.
    Push,
    /// Discard the top of the operand stack.
    Pop,
    /// Exchange the top with the element `n` below it.
    Swap,
    /// Duplicate the top of the operand stack.
    Copy,

    /// Pop a value, bind it under the operand name in the current scope.
    Define,
    /// Push the value bound to the operand name via the scope chain.
    Get,
    /// Pop a value, overwrite the nearest existing binding of the name.
    Set,

    /// Pop a number, add it to the named number binding in place.
    AddTo,
    /// Increment the named number binding.
    Inc,
    /// Decrement the named number binding.
    Dec,

    /// Pop two numbers, push their sum.
    Add,
    /// Pop two numbers, push their difference.
    Subtract,
    /// Pop two numbers, push their product.
    Multiply,
    /// Pop two numbers, push their quotient (IEEE 754 semantics).
    Divide,
    /// Pop two values, push `second < first` by the total order.
    LessThan,
    /// Pop two values, push `second > first` by the total order.
    GreaterThan,
    /// Pop two values, push structural equality.
    Equals,
    /// Pop two values, push structural inequality.
    NotEquals,
    /// Pop a bool, push its negation.
    Not,

    /// Move the program counter to a label, switching scope if qualified.
    Jump,
    /// Pop a condition; jump only if it equals `true`.
    JumpTrue,
    /// Pop a condition; jump only if it equals `false`.
    JumpFalse,

    /// Push a call frame, then jump (dynamic path); with a numeric operand,
    /// invoke a callable popped from the stack.
    Call,
    /// Invoke a statically-known callable embedded in the operand.
    CallDirect,
    /// Pop a call frame, restore the caller's counter and scope.
    Return,

    /// Hand the command value to the host's run-command hook.
    Run,
}

/// All operators, in definition order.
pub const ALL_OPERATORS: [Operator; 26] = [
    Operator::Push,
    Operator::Pop,
    Operator::Swap,
    Operator::Copy,
    Operator::Define,
    Operator::Get,
    Operator::Set,
    Operator::AddTo,
    Operator::Inc,
    Operator::Dec,
    Operator::Add,
    Operator::Subtract,
    Operator::Multiply,
    Operator::Divide,
    Operator::LessThan,
    Operator::GreaterThan,
    Operator::Equals,
    Operator::NotEquals,
    Operator::Not,
    Operator::Jump,
    Operator::JumpTrue,
    Operator::JumpFalse,
    Operator::Call,
    Operator::CallDirect,
    Operator::Return,
    Operator::Run,
];

impl Operator {
    /// Stable mnemonic, used by the disassembler and stack traces.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Push => "push",
            Operator::Pop => "pop",
            Operator::Swap => "swap",
            Operator::Copy => "copy",
            Operator::Define => "define",
            Operator::Get => "get",
            Operator::Set => "set",
            Operator::AddTo => "addTo",
            Operator::Inc => "inc",
            Operator::Dec => "dec",
            Operator::Add => "add",
            Operator::Subtract => "subtract",
            Operator::Multiply => "multiply",
            Operator::Divide => "divide",
            Operator::LessThan => "lessThan",
            Operator::GreaterThan => "greaterThan",
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Not => "not",
            Operator::Jump => "jump",
            Operator::JumpTrue => "jumpTrue",
            Operator::JumpFalse => "jumpFalse",
            Operator::Call => "call",
            Operator::CallDirect => "callDirect",
            Operator::Return => "return",
            Operator::Run => "run",
        }
    }

    /// Reverse mnemonic lookup, used by the assembler.
    pub fn from_name(name: &str) -> Option<Operator> {
        ALL_OPERATORS.iter().find(|op| op.name() == name).copied()
    }

    /// Operators whose operand may be a label reference that the assembler
    /// resolves to an instruction index.
    pub fn is_jump_family(&self) -> bool {
        matches!(
            self,
            Operator::Jump | Operator::JumpTrue | Operator::JumpFalse | Operator::Call
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
