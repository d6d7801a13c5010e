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

//! Various [`super::term::Term`] operations allowed in [`super::term::Term::App`].

#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[allow(missing_docs, reason = "self-explanatory")]
pub enum Op {
    //   ---------- SMTLib core theory ----------
    Not,
    And,
    Or,
    //   ---------- SMTLib theory of unicode strings and regular languages ----------
    /// Membership of a string in a regular language.
    StrInRe,
    /// The singleton language of a string.
    StrToRe,
    ReUnion,
    ReConcat,
    ReStar,
    /// The empty language; takes no arguments.
    ReNone,
}

impl Op {
    /// Returns the SMT-LIB name of the operator.
    pub fn mk_name(self) -> &'static str {
        match self {
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::StrInRe => "str.in_re",
            Op::StrToRe => "str.to_re",
            Op::ReUnion => "re.union",
            Op::ReConcat => "re.++",
            Op::ReStar => "re.*",
            Op::ReNone => "re.none",
        }
    }
}
