//! Tokenizer for Skald source text.
//!
//! The surface syntax is s-expressions: parentheses, bare atoms, quoted
//! strings, and `;` comments running to end of line.

use crate::error::AssemblyError;

/// A single token with the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// `(`
    Open,
    /// `)`
    Close,
    /// A bare atom: symbol, number, keyword, or label.
    Atom(String),
    /// A quoted string with escapes already applied.
    Str(String),
}

impl Token {
    fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }
}

/// Tokenize a whole source text.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, AssemblyError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                // Comment to end of line.
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' => {
                tokens.push(Token::new(TokenKind::Open, line));
                chars.next();
            }
            ')' => {
                tokens.push(Token::new(TokenKind::Close, line));
                chars.next();
            }
            '"' => {
                chars.next();
                let start_line = line;
                let mut value = String::new();
                loop {
                    match chars.next() {
                        None => {
                            return Err(AssemblyError::UnterminatedString { line: start_line })
                        }
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('"') => value.push('"'),
                            Some('\\') => value.push('\\'),
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some('r') => value.push('\r'),
                            Some(other) => {
                                return Err(AssemblyError::InvalidEscape {
                                    line,
                                    escape: other,
                                })
                            }
                            None => {
                                return Err(AssemblyError::UnterminatedString {
                                    line: start_line,
                                })
                            }
                        },
                        Some('\n') => {
                            line += 1;
                            value.push('\n');
                        }
                        Some(other) => value.push(other),
                    }
                }
                tokens.push(Token::new(TokenKind::Str(value), start_line));
            }
            _ => {
                let mut atom = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == ';' || c == '"' {
                        break;
                    }
                    atom.push(c);
                    chars.next();
                }
                tokens.push(Token::new(TokenKind::Atom(atom), line));
            }
        }
    }

    Ok(tokens)
}
