//! Runtime errors and the stack-trace machinery.
//!
//! The engine never recovers internally: every error aborts the current
//! `run`/`step` call and carries a full stack trace captured at the point
//! of failure. The trace is the engine's sole diagnostic surface; the host
//! decides whether to abort, reset, or retry.

use std::fmt;

use thiserror::Error;

use crate::operator::Operator;

/// A typed cast or pop received the wrong value tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("type mismatch: expected {expected}, found {actual}")]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: &'static str,
}

impl TypeError {
    pub fn new(expected: &'static str, actual: &'static str) -> Self {
        Self { expected, actual }
    }
}

/// The condition that aborted execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    /// Pop from an empty operand stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// Push beyond the operand stack's fixed capacity.
    #[error("stack overflow")]
    StackOverflow,

    /// Return with no call frame to pop.
    #[error("call stack underflow, unable to return")]
    CallStackUnderflow,

    /// Call nesting beyond the call stack's fixed capacity.
    #[error("call stack overflow")]
    CallStackOverflow,

    /// A typed pop, cast, or operand had the wrong value tag.
    #[error(transparent)]
    TypeMismatch(#[from] TypeError),

    /// Name lookup failed through the whole scope chain.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// A scope name was not registered with the engine.
    #[error("undefined scope: {0}")]
    UndefinedScope(String),

    /// A runtime label lookup failed in the current function.
    #[error("undefined label: {0}")]
    UndefinedLabel(String),

    /// An opcode that requires an embedded operand had none and the stack
    /// could not supply one.
    #[error("operator {0} requires an operand")]
    MissingOperand(Operator),

    /// Swap offset outside the current stack.
    #[error("invalid stack offset: {0}")]
    InvalidOffset(usize),

    /// The `run` opcode executed with no host hook registered.
    #[error("cannot run command, no handler registered")]
    NoRunHandler,

    /// `run` called before any script was loaded.
    #[error("cannot run virtual machine, no script loaded")]
    NoScriptLoaded,
}

/// One line of a stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Display name of the function.
    pub function: String,
    /// Instruction index within that function.
    pub index: usize,
    /// Rendered `operator: [operand]` description, when known.
    pub description: String,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}:{}", self.function, self.index, self.description)
    }
}

/// Captured call chain, most recent frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    pub frames: Vec<TraceFrame>,
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "{frame}")?;
        }
        Ok(())
    }
}

/// A fatal execution error with its captured stack trace.
#[derive(Debug, Clone, Error)]
#[error("{kind}\n{trace}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub trace: StackTrace,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, trace: StackTrace) -> Self {
        Self { kind, trace }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_error_display() {
        let e = TypeError::new("number", "string");
        assert_eq!(e.to_string(), "type mismatch: expected number, found string");
    }

    #[test]
    fn kind_display() {
        assert_eq!(
            RuntimeErrorKind::StackUnderflow.to_string(),
            "stack underflow"
        );
        assert_eq!(
            RuntimeErrorKind::UndefinedVariable("total".to_string()).to_string(),
            "undefined variable: total"
        );
        assert_eq!(
            RuntimeErrorKind::MissingOperand(Operator::Push).to_string(),
            "operator push requires an operand"
        );
        assert_eq!(
            RuntimeErrorKind::TypeMismatch(TypeError::new("bool", "null")).to_string(),
            "type mismatch: expected bool, found null"
        );
    }

    #[test]
    fn trace_display() {
        let trace = StackTrace {
            frames: vec![
                TraceFrame {
                    function: "step".to_string(),
                    index: 2,
                    description: "add: [<empty>]".to_string(),
                },
                TraceFrame {
                    function: "main".to_string(),
                    index: 8,
                    description: "call: [4]".to_string(),
                },
            ],
        };
        let err = RuntimeError::new(RuntimeErrorKind::StackUnderflow, trace);
        let text = err.to_string();
        assert!(text.starts_with("stack underflow\n"));
        assert!(text.contains("[step]:2:add: [<empty>]"));
        assert!(text.contains("[main]:8:call: [4]"));
    }
}
