//! Static scan of Go source for exported top-level functions.
//!
//! This is a lexical pass, not a parser: comments and literals are skipped,
//! bracket nesting is tracked, and `func Name(` / `func Name[` at nesting
//! depth zero is a top-level function declaration. Methods (`func (r T) Name`)
//! and function literals never match.

use std::fs;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use super::{HandlerResolver, Resolution};
use crate::error::{Error, Result};

/// Resolves handlers by scanning the candidate's Go source.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoSourceResolver;

impl GoSourceResolver {
    pub fn new() -> Self {
        Self
    }
}

impl HandlerResolver for GoSourceResolver {
    fn resolve(&self, source: &Path) -> Result<Resolution> {
        let contents = fs::read_to_string(source).map_err(|e| {
            Error::HandlerResolution(format!("cannot read {}: {}", source.display(), e))
        })?;
        Ok(Resolution::from_names(exported_functions(&contents)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Punct(char),
    Literal,
}

/// Names of exported top-level functions, in declaration order.
pub fn exported_functions(source: &str) -> Vec<String> {
    let tokens = tokenize(source);
    let mut names = Vec::new();

    for (i, (token, depth)) in tokens.iter().enumerate() {
        if *depth != 0 || !matches!(token, Token::Ident(kw) if kw == "func") {
            continue;
        }

        if let (Some((Token::Ident(name), 0)), Some((Token::Punct('(' | '['), 0))) =
            (tokens.get(i + 1), tokens.get(i + 2))
        {
            if is_exported(name) {
                names.push(name.clone());
            }
        }
    }

    names
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Split source into tokens paired with the bracket depth they appear at.
fn tokenize(source: &str) -> Vec<(Token, u32)> {
    let mut tokens = Vec::new();
    let mut depth: u32 = 0;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '"' | '\'' => {
                skip_quoted(&mut chars, c);
                tokens.push((Token::Literal, depth));
            }
            '`' => {
                for c in chars.by_ref() {
                    if c == '`' {
                        break;
                    }
                }
                tokens.push((Token::Literal, depth));
            }
            '{' | '(' | '[' => {
                tokens.push((Token::Punct(c), depth));
                depth += 1;
            }
            '}' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                tokens.push((Token::Punct(c), depth));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Ident(ident), depth));
            }
            c if c.is_ascii_digit() => {
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '.' || next == '_' {
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Literal, depth));
            }
            c if c.is_whitespace() => {}
            other => tokens.push((Token::Punct(other), depth)),
        }
    }

    tokens
}

/// Skip an interpreted string or rune literal; the opening quote is consumed.
fn skip_quoted(chars: &mut Peekable<Chars<'_>>, quote: char) {
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            // Unterminated literal; resume scanning on the next line
            '\n' => break,
            c if c == quote => break,
            _ => {}
        }
    }
}
