//! Error types for the Skald assembler.

use thiserror::Error;

/// Errors produced while compiling source text to bytecode.
///
/// All of these are raised at assembly time, before any execution; a
/// failed assembly never produces a partial script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// A `)` with no matching `(`.
    #[error("line {line}: unexpected ')'")]
    UnexpectedClose { line: usize },

    /// Input ended inside an unclosed list.
    #[error("unexpected end of input, unclosed '('")]
    UnexpectedEndOfInput,

    /// Input ended inside a string literal.
    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    /// A string literal used an escape the assembler does not know.
    #[error("line {line}: invalid escape '\\{escape}'")]
    InvalidEscape { line: usize, escape: char },

    /// A form was missing a required part.
    #[error("line {line}: '{form}' expects {expected}")]
    MissingArgument {
        line: usize,
        form: String,
        expected: &'static str,
    },

    /// A form could not be understood at all.
    #[error("line {line}: malformed '{form}': {message}")]
    MalformedForm {
        line: usize,
        form: String,
        message: String,
    },

    /// `continue` or `break` outside of any enclosing loop.
    #[error("line {line}: '{keyword}' outside of a loop")]
    OutsideLoop { line: usize, keyword: &'static str },

    /// A jump referenced a label never declared in its function.
    #[error("unresolved label {label} in function {function}")]
    UnresolvedLabel { label: String, function: String },

    /// A dotted property path did not resolve against the builtin scope.
    #[error("line {line}: unknown property path '{path}'")]
    UnknownProperty { line: usize, path: String },
}
