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

//! This file defines the Term language, a small, strongly typed IR to which
//! policies are reduced during symbolic compilation. Every term has a direct
//! translation to SMT-LIB.
//!
//! Terms should _not_ be created directly using `Term` constructors. Instead,
//! they should be created using the factory functions defined in `factory.rs`,
//! which perform simplifications and keep terms well-typed.

use std::sync::Arc;

use smol_str::SmolStr;

use super::op::Op;
use super::term_type::TermType;

/// A free variable. Free variables stand for the value a component takes in
/// an arbitrary request.
#[derive(Clone, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct TermVar {
    /// The variable's name, e.g. `principal_username`
    pub id: SmolStr,
    /// The variable's type
    pub ty: TermType,
}

#[derive(Clone, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[allow(missing_docs, reason = "self-explanatory")]
pub enum TermPrim {
    Bool(bool),
    String(SmolStr),
}

#[derive(Clone, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[allow(missing_docs, reason = "self-explanatory")]
pub enum Term {
    Prim(TermPrim),
    Var(TermVar),
    App {
        op: Op,
        args: Arc<Vec<Term>>,
        ret_ty: TermType,
    },
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::Prim(TermPrim::Bool(b))
    }
}

impl From<SmolStr> for Term {
    fn from(s: SmolStr) -> Self {
        Term::Prim(TermPrim::String(s))
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Prim(TermPrim::String(s.into()))
    }
}

impl From<TermVar> for Term {
    fn from(v: TermVar) -> Self {
        Term::Var(v)
    }
}

impl TermPrim {
    /// Type of the literal
    pub fn type_of(&self) -> TermType {
        match self {
            TermPrim::Bool(_) => TermType::Bool,
            TermPrim::String(_) => TermType::String,
        }
    }
}

impl Term {
    /// Type of the term
    pub fn type_of(&self) -> TermType {
        match self {
            Term::Prim(p) => p.type_of(),
            Term::Var(v) => v.ty,
            Term::App { ret_ty, .. } => *ret_ty,
        }
    }

    /// Is this term a literal?
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Prim(_))
    }

    /// The free variables of this term, in order of first appearance
    pub fn free_vars(&self) -> Vec<&TermVar> {
        fn go<'a>(t: &'a Term, acc: &mut Vec<&'a TermVar>) {
            match t {
                Term::Prim(_) => {}
                Term::Var(v) => {
                    if !acc.contains(&v) {
                        acc.push(v);
                    }
                }
                Term::App { args, .. } => {
                    for arg in args.iter() {
                        go(arg, acc);
                    }
                }
            }
        }
        let mut acc = Vec::new();
        go(self, &mut acc);
        acc
    }
}
