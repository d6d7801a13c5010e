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

//! This module defines the encoder, which translates boolean [`Term`]s into
//! SMT-LIB definitions.
//!
//! Types map directly to builtin SMT sorts:
//!  * `TermType::Bool`:   `Bool`
//!  * `TermType::String`: `String`
//!  * `TermType::RegLan`: `RegLan`
//!
//! Each free variable is declared once with `declare-const`, preceded by a
//! comment naming it. Every other non-atomic term is bound once with
//! `define-fun`, so the output is in A-normal form: the body of every
//! s-expression consists of identifiers or literals. Identifiers are `t<n>`,
//! numbered in order of definition. The memo table mapping terms to their
//! identifiers is owned by the caller, so a solver session can keep encoding
//! new terms against definitions it has already emitted.

use async_recursion::async_recursion;
use miette::Diagnostic;
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

use super::{
    op::Op,
    smtlib_script::SmtLibScript,
    term::{Term, TermPrim, TermVar},
};

/// Errors during encoding, i.e., converting [`Term`]
/// to SMT-LIB 2 format.
#[derive(Debug, Diagnostic, Error)]
pub enum EncodeError {
    /// IO error.
    #[error("IO error during SMT encoding")]
    Io(#[from] std::io::Error),
    /// Unable to encode string.
    #[error("unable to encode string \"{0}\" in SMT as it exceeds the max supported code point")]
    EncodeStringFailed(String),
}

type Result<T> = std::result::Result<T, EncodeError>;

fn term_id(n: usize) -> String {
    format!("t{n}")
}

/// Writes term definitions to `script`, memoizing them in `terms`
#[derive(Debug)]
pub struct Encoder<'a, W: ?Sized> {
    terms: &'a mut BTreeMap<Term, String>,
    script: &'a mut W,
}

impl<'a, W: tokio::io::AsyncWrite + Unpin + Send + ?Sized> Encoder<'a, W> {
    /// Encoder that continues from the definitions in `terms`
    pub fn new(terms: &'a mut BTreeMap<Term, String>, script: &'a mut W) -> Self {
        Self { terms, script }
    }

    async fn declare_var(&mut self, v: &TermVar) -> Result<String> {
        let id = term_id(self.terms.len());
        self.script.comment(&v.id).await?;
        self.script.declare_const(&id, v.ty.smt_sort()).await?;
        Ok(id)
    }

    async fn define_term(&mut self, ty_enc: &str, t_enc: &str) -> Result<String> {
        let id = term_id(self.terms.len());
        self.script.define_fun(&id, [], ty_enc, t_enc).await?;
        Ok(id)
    }

    /// Encode `t`, returning its identifier or atom
    #[async_recursion]
    pub async fn encode_term(&mut self, t: &Term) -> Result<String> {
        if let Some(enc) = self.terms.get(t) {
            return Ok(enc.clone());
        }
        let enc = match t {
            Term::Var(v) => self.declare_var(v).await?,
            Term::Prim(TermPrim::Bool(b)) => return Ok(b.to_string()),
            Term::Prim(TermPrim::String(s)) => {
                return Ok(format!(
                    "\"{}\"",
                    encode_string(s).ok_or_else(|| EncodeError::EncodeStringFailed(s.to_string()))?
                ));
            }
            Term::App {
                op: Op::ReNone, ..
            } => return Ok(Op::ReNone.mk_name().to_string()),
            Term::App { op, args, ret_ty } => {
                let mut encoded_terms = vec![];
                for arg in args.iter() {
                    encoded_terms.push(self.encode_term(arg).await?);
                }
                self.define_term(
                    ret_ty.smt_sort(),
                    &format!("({} {})", op.mk_name(), encoded_terms.join(" ")),
                )
                .await?
            }
        };
        self.terms.insert(t.clone(), enc.clone());
        Ok(enc)
    }

    /// Encode every term in `ts`, returning their identifiers in order
    pub async fn encode(&mut self, ts: impl IntoIterator<Item = &Term>) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for t in ts {
            ids.push(self.encode_term(t).await?);
        }
        Ok(ids)
    }
}

/// The maximum Unicode code point supported in SMT-LIB 2.7.
pub const SMT_LIB_MAX_CODE_POINT: u32 = 196607;

/// Encodes a string literal's contents with two levels of escaping:
/// - At the string theory level, every non-printable character (outside
///   [32, 126]) becomes `\u{xxxx}`.
/// - At the parser level, a `"` becomes `""`.
///
/// A backslash is written as `\u{5c}` so it never starts an escape sequence.
pub(super) fn encode_string(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '"' {
            out.push_str("\"\"");
        } else if c == '\\' {
            out.push_str("\\u{5c}");
        } else if (' '..='~').contains(&c) {
            out.push(c);
        } else {
            if c as u32 > SMT_LIB_MAX_CODE_POINT {
                return None;
            }
            #[allow(clippy::unwrap_used, reason = "writing string cannot fail")]
            write!(out, "\\u{{{:x}}}", c as u32).unwrap();
        }
    }
    Some(out)
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::symcc::factory::{re_none, re_star, re_union, str_in_re, str_to_re};
    use crate::symcc::term_type::TermType;

    fn var(id: &str) -> Term {
        TermVar {
            id: id.into(),
            ty: TermType::String,
        }
        .into()
    }

    async fn encode_to_string(ts: &[Term]) -> (Vec<String>, String) {
        let mut terms = BTreeMap::new();
        let mut out = Vec::<u8>::new();
        let ids = Encoder::new(&mut terms, &mut out)
            .encode(ts.iter())
            .await
            .unwrap();
        (ids, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn anf_output() {
        let t = str_in_re(
            var("action"),
            re_union([str_to_re("GET".into()), str_to_re("PUT".into())]),
        );
        let (ids, out) = encode_to_string(&[t]).await;
        assert_eq!(ids, ["t4"]);
        similar_asserts::assert_eq!(
            out,
            "; action\n\
             (declare-const t0 String)\n\
             (define-fun t1 () RegLan (str.to_re \"GET\"))\n\
             (define-fun t2 () RegLan (str.to_re \"PUT\"))\n\
             (define-fun t3 () RegLan (re.union t1 t2))\n\
             (define-fun t4 () Bool (str.in_re t0 t3))\n"
        );
    }

    #[tokio::test]
    async fn shared_subterms_are_defined_once() {
        let x = var("x");
        let star = re_star(str_to_re("a".into()));
        let t1 = str_in_re(x.clone(), star.clone());
        let t2 = str_in_re(x, re_union([star, str_to_re("b".into())]));
        let (ids, out) = encode_to_string(&[t1, t2]).await;
        assert_eq!(ids, ["t3", "t6"]);
        assert_eq!(out.matches("declare-const").count(), 1);
        assert_eq!(out.matches("(re.* ").count(), 1);
    }

    #[tokio::test]
    async fn memo_survives_encoders() {
        let mut terms = BTreeMap::new();
        let mut out = Vec::<u8>::new();
        let t = str_in_re(var("x"), str_to_re("a".into()));
        let first = Encoder::new(&mut terms, &mut out)
            .encode_term(&t)
            .await
            .unwrap();
        let len = out.len();
        let second = Encoder::new(&mut terms, &mut out)
            .encode_term(&t)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(out.len(), len);
    }

    #[tokio::test]
    async fn atoms() {
        let (ids, out) = encode_to_string(&[true.into(), re_none()]).await;
        assert_eq!(ids, ["true", "re.none"]);
        assert!(out.is_empty());
    }

    #[test]
    fn strings() {
        assert_eq!(encode_string("s2/home/*").unwrap(), "s2/home/*");
        assert_eq!(encode_string("a\"b").unwrap(), "a\"\"b");
        assert_eq!(encode_string("a\\u{0}").unwrap(), "a\\u{5c}u{0}");
        assert_eq!(encode_string("\n").unwrap(), "\\u{a}");
        assert_eq!(encode_string("é").unwrap(), "\\u{e9}");
        assert_eq!(encode_string("\u{30000}"), None);
    }
}
