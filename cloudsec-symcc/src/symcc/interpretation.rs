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

//! This module defines [`Model`], a concrete assignment of strings to free
//! variables, and [`Interpretation`], which evaluates boolean terms under a
//! model without a solver.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use super::op::Op;
use super::term::{Term, TermPrim};
use super::term_type::TermType;

/// A concrete request: the value of each free variable, by name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Model {
    vars: BTreeMap<SmolStr, SmolStr>,
}

impl Model {
    /// Set the value of `var`
    pub fn insert(&mut self, var: impl Into<SmolStr>, value: impl Into<SmolStr>) {
        self.vars.insert(var.into(), value.into());
    }

    /// The value of `var`, if the model assigns one
    pub fn get(&self, var: &str) -> Option<&str> {
        self.vars.get(var).map(SmolStr::as_str)
    }

    /// Assignments, ordered by variable name
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &SmolStr)> {
        self.vars.iter()
    }

    /// Number of assigned variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Does the model assign nothing?
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<SmolStr>, V: Into<SmolStr>> FromIterator<(K, V)> for Model {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v:?}")?;
        }
        write!(f, "}}")
    }
}

/// Errors evaluating a term under an [`Interpretation`]
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum EvalError {
    /// The term does not have the type the context requires
    #[error("expected a term of type {expected:?}, found one of type {found:?}")]
    TypeMismatch {
        /// Required type
        expected: TermType,
        /// Actual type
        found: TermType,
    },
    /// An operator applied to the wrong number of arguments
    #[error("`{0}` applied to the wrong number of arguments")]
    Arity(&'static str),
}

type Result<T> = std::result::Result<T, EvalError>;

/// Evaluates terms under a [`Model`]. Variables the model does not assign
/// take the empty string.
#[derive(Debug, Clone, Copy)]
pub struct Interpretation<'a> {
    model: &'a Model,
}

impl<'a> Interpretation<'a> {
    /// Interpretation of `model`
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Evaluate a boolean term
    pub fn eval(&self, t: &Term) -> Result<bool> {
        match t {
            Term::Prim(TermPrim::Bool(b)) => Ok(*b),
            Term::App { op, args, .. } => match (op, args.as_slice()) {
                (Op::Not, [t]) => Ok(!self.eval(t)?),
                (Op::Not, _) => Err(EvalError::Arity(op.mk_name())),
                (Op::And, args) => {
                    for arg in args {
                        if !self.eval(arg)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                (Op::Or, args) => {
                    for arg in args {
                        if self.eval(arg)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                (Op::StrInRe, [s, re]) => {
                    let text: Vec<char> = self.eval_string(s)?.chars().collect();
                    Ok(self.ends(re, &text, 0)?.contains(&text.len()))
                }
                (Op::StrInRe, _) => Err(EvalError::Arity(op.mk_name())),
                _ => Err(EvalError::TypeMismatch {
                    expected: TermType::Bool,
                    found: t.type_of(),
                }),
            },
            _ => Err(EvalError::TypeMismatch {
                expected: TermType::Bool,
                found: t.type_of(),
            }),
        }
    }

    /// Evaluate a string term
    pub fn eval_string(&self, t: &Term) -> Result<SmolStr> {
        match t {
            Term::Prim(TermPrim::String(s)) => Ok(s.clone()),
            Term::Var(v) if v.ty == TermType::String => {
                Ok(self.model.get(&v.id).map(SmolStr::from).unwrap_or_default())
            }
            _ => Err(EvalError::TypeMismatch {
                expected: TermType::String,
                found: t.type_of(),
            }),
        }
    }

    /// Does `s` belong to the language `re`?
    pub fn matches(&self, s: &str, re: &Term) -> Result<bool> {
        let text: Vec<char> = s.chars().collect();
        Ok(self.ends(re, &text, 0)?.contains(&text.len()))
    }

    /// Every `j` such that `text[start..j]` belongs to the language `re`
    fn ends(&self, re: &Term, text: &[char], start: usize) -> Result<BTreeSet<usize>> {
        let Term::App { op, args, .. } = re else {
            return Err(EvalError::TypeMismatch {
                expected: TermType::RegLan,
                found: re.type_of(),
            });
        };
        match (op, args.as_slice()) {
            (Op::ReNone, _) => Ok(BTreeSet::new()),
            (Op::StrToRe, [s]) => {
                let lit: Vec<char> = self.eval_string(s)?.chars().collect();
                let hit = text
                    .get(start..)
                    .is_some_and(|rest| rest.starts_with(&lit));
                Ok(if hit {
                    BTreeSet::from([start + lit.len()])
                } else {
                    BTreeSet::new()
                })
            }
            (Op::ReUnion, res) => {
                let mut out = BTreeSet::new();
                for re in res {
                    out.extend(self.ends(re, text, start)?);
                }
                Ok(out)
            }
            (Op::ReConcat, res) => {
                let mut positions = BTreeSet::from([start]);
                for re in res {
                    let mut next = BTreeSet::new();
                    for p in positions {
                        next.extend(self.ends(re, text, p)?);
                    }
                    positions = next;
                }
                Ok(positions)
            }
            (Op::ReStar, [re]) => {
                let mut reached = BTreeSet::from([start]);
                let mut frontier = vec![start];
                while let Some(p) = frontier.pop() {
                    for q in self.ends(re, text, p)? {
                        if reached.insert(q) {
                            frontier.push(q);
                        }
                    }
                }
                Ok(reached)
            }
            (Op::StrToRe | Op::ReStar, _) => Err(EvalError::Arity(op.mk_name())),
            _ => Err(EvalError::TypeMismatch {
                expected: TermType::RegLan,
                found: re.type_of(),
            }),
        }
    }
}

#[cfg(test)]
mod interpret_test {
    use super::*;
    use crate::symcc::factory::{
        and, not, or, re_concat, re_none, re_star, re_union, str_in_re, str_to_re,
    };
    use crate::symcc::term::TermVar;
    use cool_asserts::assert_matches;

    fn var(id: &str) -> Term {
        TermVar {
            id: id.into(),
            ty: TermType::String,
        }
        .into()
    }

    fn lit(s: &str) -> Term {
        str_to_re(s.into())
    }

    #[test]
    fn regex_matching() {
        let model = Model::default();
        let i = Interpretation::new(&model);
        let ab_star = re_star(re_union([lit("a"), lit("b")]));
        let re = re_concat([lit("s2/"), ab_star.clone(), lit(".py")]);
        assert!(i.matches("s2/.py", &re).unwrap());
        assert!(i.matches("s2/abba.py", &re).unwrap());
        assert!(!i.matches("s2/abc.py", &re).unwrap());
        assert!(!i.matches("s2/ab.pyx", &re).unwrap());
        assert!(i.matches("", &ab_star).unwrap());
        assert!(!i.matches("", &re_none()).unwrap());
        assert!(i.matches("", &lit("")).unwrap());
        // empty-string loops terminate
        assert!(i.matches("a", &re_star(re_star(lit("")))).is_ok_and(|m| !m));
    }

    #[test]
    fn boolean_eval() {
        let model: Model = [("action", "GET"), ("path", "s2/x")].into_iter().collect();
        let i = Interpretation::new(&model);
        let get = str_in_re(var("action"), lit("GET"));
        let put = str_in_re(var("action"), lit("PUT"));
        assert!(i.eval(&get).unwrap());
        assert!(!i.eval(&put).unwrap());
        assert!(i.eval(&or(get.clone(), put.clone())).unwrap());
        assert!(!i.eval(&and(get.clone(), put.clone())).unwrap());
        assert!(i.eval(&and(get, not(put))).unwrap());
        // unassigned variables are empty
        assert!(i.eval(&str_in_re(var("other"), lit(""))).unwrap());
    }

    #[test]
    fn placeholders() {
        let model: Model = [("user", "jstubbs"), ("path", "home/jstubbs")]
            .into_iter()
            .collect();
        let i = Interpretation::new(&model);
        let t = str_in_re(var("path"), re_concat([lit("home/"), str_to_re(var("user"))]));
        assert!(i.eval(&t).unwrap());
    }

    #[test]
    fn ill_typed() {
        let model = Model::default();
        let i = Interpretation::new(&model);
        assert_matches!(
            i.eval(&var("x")),
            Err(EvalError::TypeMismatch {
                expected: TermType::Bool,
                ..
            })
        );
        assert_matches!(
            i.matches("x", &"x".into()),
            Err(EvalError::TypeMismatch { .. })
        );
    }

    #[test]
    fn model_display() {
        let model: Model = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(model.to_string(), r#"{a: "1", b: "2"}"#);
        assert_eq!(model.len(), 2);
    }
}
