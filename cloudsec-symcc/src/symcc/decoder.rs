/*
 * Copyright Cloudsec Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! This module defines the decoder, the inverse of the encoder for the subset
//! of SMT-LIB that `(get-model)` produces: a list of `define-fun` entries for
//! the declared string constants.

use std::collections::BTreeMap;
use std::fmt::Display;

use itertools::Itertools;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use super::interpretation::Model;
use super::term::Term;

/// Errors while reading solver output
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("invalid numeric token: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("right parenthesis without left parenthesis")]
    RightParenWithoutLeftParen,

    #[error("trailing tokens")]
    TrailingTokens,

    #[error("model of unexpected form returned by the solver: {0}")]
    UnexpectedModel(String),
}

/// Types of tokens
#[derive(Debug)]
enum Token {
    LeftParen,
    RightParen,
    Atom(SExpr),
}

/// S-expressions
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs, reason = "self-explanatory")]
pub enum SExpr {
    Numeral(u128),
    /// A string literal, with `""` already collapsed but `\u{..}` escapes
    /// still in place
    String(String),
    Symbol(String),
    App(Vec<SExpr>),
}

/// Tokenizes a string of SMT-LIB 2 S-expressions
fn tokenize(src: &str) -> Result<Vec<Token>, DecodeError> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '(' => tokens.push(Token::LeftParen),
            ')' => tokens.push(Token::RightParen),
            '"' => {
                let mut s = String::new();
                loop {
                    match chars.next() {
                        // Two double quotes ("") is an escaped double quote
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            s.push('"');
                        }
                        Some('"') => break,
                        Some(c) => s.push(c),
                        None => return Err(DecodeError::UnexpectedEnd),
                    }
                }
                tokens.push(Token::Atom(SExpr::String(s)));
            }
            '|' => {
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('|') => break,
                        Some(c) => s.push(c),
                        None => return Err(DecodeError::UnexpectedEnd),
                    }
                }
                tokens.push(Token::Atom(SExpr::Symbol(s)));
            }
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_ascii_digit() => {
                let mut num = String::from(c);
                while let Some(d) = chars.next_if(char::is_ascii_digit) {
                    num.push(d);
                }
                tokens.push(Token::Atom(SExpr::Numeral(num.parse()?)));
            }
            c if c.is_whitespace() => {}
            c => {
                let mut symbol = String::from(c);
                while let Some(d) = chars
                    .next_if(|d| !matches!(d, '(' | ')' | ';' | '"' | '|') && !d.is_whitespace())
                {
                    symbol.push(d);
                }
                tokens.push(Token::Atom(SExpr::Symbol(symbol)));
            }
        }
    }

    Ok(tokens)
}

/// Parses the input source as an S-expression
pub fn parse_sexpr(src: &str) -> Result<SExpr, DecodeError> {
    let mut stack: Vec<Vec<SExpr>> = Vec::new();

    let tokens = tokenize(src)?;
    let token_count = tokens.len();

    for (i, token) in tokens.into_iter().enumerate() {
        let done = match token {
            Token::LeftParen => {
                stack.push(Vec::new());
                continue;
            }
            Token::RightParen => {
                let Some(exprs) = stack.pop() else {
                    return Err(DecodeError::RightParenWithoutLeftParen);
                };
                SExpr::App(exprs)
            }
            Token::Atom(s) => s,
        };
        if let Some(last) = stack.last_mut() {
            last.push(done);
        } else if i + 1 == token_count {
            return Ok(done);
        } else {
            return Err(DecodeError::TrailingTokens);
        }
    }

    Err(DecodeError::UnexpectedEnd)
}

/// Resolves SMT-LIB escape sequences in a string literal: `\u{d₀..d₄}` and
/// `\ud₃d₂d₁d₀`. Anything else is kept verbatim.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("\\u") {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);
        let after = tail.get(2..).unwrap_or_default();
        let (hex, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.split_once('}') {
                Some((hex, _)) if (1..=5).contains(&hex.len()) => (hex, hex.len() + 2),
                _ => ("", 0),
            },
            None => (after.get(..4).unwrap_or_default(), 4),
        };
        match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
            Some(c) if hex.chars().all(|h| h.is_ascii_hexdigit()) => {
                out.push(c);
                rest = after.get(consumed..).unwrap_or_default();
            }
            _ => {
                out.push_str("\\u");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Maps from SMT symbols to the names of the free variables they declare.
#[derive(Debug, Default)]
pub struct IdMaps {
    vars: BTreeMap<String, SmolStr>,
}

impl IdMaps {
    /// Extracts the reverse mapping from SMT symbols to variable names from
    /// the encoder's memo table.
    pub fn from_terms(terms: &BTreeMap<Term, String>) -> Self {
        let vars = terms
            .iter()
            .filter_map(|(term, enc)| match term {
                Term::Var(v) => Some((enc.clone(), v.id.clone())),
                _ => None,
            })
            .collect();
        Self { vars }
    }
}

impl SExpr {
    /// Decodes a `(get-model)` response. Entries for symbols that are not
    /// free variables, or whose value is not a string literal, are skipped.
    pub fn decode_model(&self, id_maps: &IdMaps) -> Result<Model, DecodeError> {
        let SExpr::App(cmds) = self else {
            return Err(DecodeError::UnexpectedModel(self.to_string()));
        };
        // older z3 versions prefix the entries with `model`
        let cmds = match cmds.split_first() {
            Some((SExpr::Symbol(head), rest)) if head == "model" => rest,
            _ => cmds.as_slice(),
        };

        let mut model = Model::default();
        for cmd in cmds {
            match cmd {
                SExpr::App(sub_exprs) => match sub_exprs.as_slice() {
                    [SExpr::Symbol(define_fun), SExpr::Symbol(name), SExpr::App(args), _, body]
                        if define_fun == "define-fun" && args.is_empty() =>
                    {
                        if let (Some(var), SExpr::String(s)) = (id_maps.vars.get(name), body) {
                            model.insert(var.clone(), unescape(s));
                        }
                    }
                    [SExpr::Symbol(define_fun), ..] if define_fun == "define-fun" => {}
                    _ => return Err(DecodeError::UnexpectedModel(cmd.to_string())),
                },
                _ => return Err(DecodeError::UnexpectedModel(cmd.to_string())),
            }
        }
        Ok(model)
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Numeral(n) => write!(f, "{n}"),
            SExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            SExpr::Symbol(s) => write!(f, "{s}"),
            SExpr::App(exprs) => write!(f, "({})", exprs.iter().join(" ")),
        }
    }
}

/// Parses and decodes a `(get-model)` response
pub fn decode_model(output: &str, id_maps: &IdMaps) -> Result<Model, DecodeError> {
    parse_sexpr(output)?.decode_model(id_maps)
}
