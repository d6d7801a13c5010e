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

#![allow(
    missing_docs,
    reason = "The meaning of most functions is clear from their names"
)]

//! Utility functions to construct [`Term`]s.

use std::sync::Arc;

use itertools::Itertools;

use super::op::Op;
use super::term::{Term, TermPrim};
use super::term_type::TermType;

fn app(op: Op, args: Vec<Term>, ret_ty: TermType) -> Term {
    Term::App {
        op,
        args: Arc::new(args),
        ret_ty,
    }
}

// ---------- SMTLib core theory ----------

pub fn not(t: Term) -> Term {
    match t {
        Term::Prim(TermPrim::Bool(b)) => (!b).into(),
        Term::App {
            op: Op::Not, args, ..
        } if args.len() == 1 => match Arc::unwrap_or_clone(args).into_iter().next() {
            Some(inner) => inner,
            None => false.into(),
        },
        t => app(Op::Not, vec![t], TermType::Bool),
    }
}

pub fn opposites(t1: &Term, t2: &Term) -> bool {
    match (t1, t2) {
        (
            t1,
            Term::App {
                op: Op::Not, args, ..
            },
        ) => args.as_slice() == std::slice::from_ref(t1),
        (
            Term::App {
                op: Op::Not, args, ..
            },
            t2,
        ) => args.as_slice() == std::slice::from_ref(t2),
        (_, _) => false,
    }
}

pub fn and(t1: Term, t2: Term) -> Term {
    if t1 == t2 || t2 == true.into() {
        t1
    } else if t1 == true.into() {
        t2
    } else if t1 == false.into() || t2 == false.into() || opposites(&t1, &t2) {
        false.into()
    } else {
        app(Op::And, vec![t1, t2], TermType::Bool)
    }
}

pub fn or(t1: Term, t2: Term) -> Term {
    if t1 == t2 || t2 == false.into() {
        t1
    } else if t1 == false.into() {
        t2
    } else if t1 == true.into() || t2 == true.into() || opposites(&t1, &t2) {
        true.into()
    } else {
        app(Op::Or, vec![t1, t2], TermType::Bool)
    }
}

pub fn implies(t1: Term, t2: Term) -> Term {
    or(not(t1), t2)
}

/// Conjunction of `ts`; `true` if empty
pub fn all_true(ts: impl IntoIterator<Item = Term>) -> Term {
    ts.into_iter().fold(true.into(), and)
}

/// Disjunction of `ts`; `false` if empty
pub fn any_true(ts: impl IntoIterator<Item = Term>) -> Term {
    ts.into_iter().fold(false.into(), or)
}

// ---------- SMTLib theory of strings and regular languages ----------

pub fn str_in_re(s: Term, re: Term) -> Term {
    match &re {
        Term::App {
            op: Op::ReNone, ..
        } => false.into(),
        _ => app(Op::StrInRe, vec![s, re], TermType::Bool),
    }
}

pub fn str_to_re(s: Term) -> Term {
    app(Op::StrToRe, vec![s], TermType::RegLan)
}

pub fn re_none() -> Term {
    app(Op::ReNone, vec![], TermType::RegLan)
}

/// Union of `res`, with duplicates and empty languages dropped. The union of
/// nothing is [`re_none`].
pub fn re_union(res: impl IntoIterator<Item = Term>) -> Term {
    let none = re_none();
    let mut res: Vec<Term> = res.into_iter().filter(|r| r != &none).unique().collect();
    match res.len() {
        0 => none,
        1 => res.pop().unwrap_or(none),
        _ => app(Op::ReUnion, res, TermType::RegLan),
    }
}

/// Concatenation of `res`. The concatenation of nothing is the language of
/// the empty string; any empty language makes the result empty.
pub fn re_concat(res: impl IntoIterator<Item = Term>) -> Term {
    let none = re_none();
    let mut res: Vec<Term> = res.into_iter().collect();
    if res.contains(&none) {
        return none;
    }
    match res.len() {
        0 => str_to_re("".into()),
        1 => res.pop().unwrap_or(none),
        _ => app(Op::ReConcat, res, TermType::RegLan),
    }
}

pub fn re_star(re: Term) -> Term {
    app(Op::ReStar, vec![re], TermType::RegLan)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symcc::term::TermVar;

    fn var(id: &str) -> Term {
        TermVar {
            id: id.into(),
            ty: TermType::Bool,
        }
        .into()
    }

    #[test]
    fn boolean_folding() {
        let x = var("x");
        assert_eq!(not(not(x.clone())), x);
        assert_eq!(and(x.clone(), true.into()), x);
        assert_eq!(and(x.clone(), not(x.clone())), false.into());
        assert_eq!(or(false.into(), x.clone()), x);
        assert_eq!(or(not(x.clone()), x.clone()), true.into());
        assert_eq!(implies(false.into(), x.clone()), true.into());
        assert_eq!(all_true([]), true.into());
        assert_eq!(any_true([]), false.into());
        assert_eq!(any_true([x.clone()]), x);
    }

    #[test]
    fn regex_folding() {
        let a = str_to_re("a".into());
        assert_eq!(re_union([a.clone(), a.clone()]), a);
        assert_eq!(re_union([]), re_none());
        assert_eq!(re_union([re_none(), a.clone()]), a);
        assert_eq!(re_concat([]), str_to_re("".into()));
        assert_eq!(re_concat([a.clone()]), a);
        assert_eq!(re_concat([a.clone(), re_none()]), re_none());
        assert_eq!(str_in_re("s".into(), re_none()), false.into());
        assert_eq!(re_concat([a.clone(), a]).type_of(), TermType::RegLan);
    }
}
