//! Parses a token stream into an expression tree.
//!
//! Atoms are classified here: numbers, `true`/`false`/`null`, and quoted
//! strings become literal values; everything else stays a symbol for the
//! compiler to interpret.

use skald_vm::Value;

use crate::error::AssemblyError;
use crate::lexer::{Token, TokenKind};

/// One node of the source expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// A bare name: keyword, variable reference, label, or operator.
    Symbol { name: String, line: usize },
    /// A literal value known at parse time.
    Literal { value: Value, line: usize },
    /// A parenthesized form.
    List { items: Vec<Expr>, line: usize },
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Symbol { line, .. } => *line,
            Expr::Literal { line, .. } => *line,
            Expr::List { line, .. } => *line,
        }
    }
}

/// Parse all top-level expressions.
pub(crate) fn parse(tokens: &[Token]) -> Result<Vec<Expr>, AssemblyError> {
    let mut position = 0;
    let mut expressions = Vec::new();
    while position < tokens.len() {
        let (expr, next) = parse_expr(tokens, position)?;
        expressions.push(expr);
        position = next;
    }
    Ok(expressions)
}

fn parse_expr(tokens: &[Token], position: usize) -> Result<(Expr, usize), AssemblyError> {
    let token = match tokens.get(position) {
        Some(token) => token,
        None => return Err(AssemblyError::UnexpectedEndOfInput),
    };

    match &token.kind {
        TokenKind::Open => {
            let line = token.line;
            let mut items = Vec::new();
            let mut position = position + 1;
            loop {
                match tokens.get(position) {
                    None => return Err(AssemblyError::UnexpectedEndOfInput),
                    Some(token) if token.kind == TokenKind::Close => {
                        return Ok((Expr::List { items, line }, position + 1));
                    }
                    Some(_) => {
                        let (expr, next) = parse_expr(tokens, position)?;
                        items.push(expr);
                        position = next;
                    }
                }
            }
        }
        TokenKind::Close => Err(AssemblyError::UnexpectedClose { line: token.line }),
        TokenKind::Str(value) => Ok((
            Expr::Literal {
                value: Value::string(value),
                line: token.line,
            },
            position + 1,
        )),
        TokenKind::Atom(atom) => Ok((classify_atom(atom, token.line), position + 1)),
    }
}

/// Turn a bare atom into a literal when it reads as one.
fn classify_atom(atom: &str, line: usize) -> Expr {
    match atom {
        "true" => {
            return Expr::Literal {
                value: Value::Bool(true),
                line,
            }
        }
        "false" => {
            return Expr::Literal {
                value: Value::Bool(false),
                line,
            }
        }
        "null" => {
            return Expr::Literal {
                value: Value::Null,
                line,
            }
        }
        _ => {}
    }

    if looks_numeric(atom) {
        if let Ok(number) = atom.parse::<f64>() {
            return Expr::Literal {
                value: Value::Number(number),
                line,
            };
        }
    }

    Expr::Symbol {
        name: atom.to_string(),
        line,
    }
}

/// Guard against `f64::from_str` accepting words like `inf` and `nan`,
/// and against operator symbols like `-` parsing as numbers.
fn looks_numeric(atom: &str) -> bool {
    let mut chars = atom.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-') | Some('+') | Some('.') => {
            matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == '.')
        }
        _ => false,
    }
}
