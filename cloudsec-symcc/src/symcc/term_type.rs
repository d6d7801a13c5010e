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

//! Definitions of term types.

/// Types of [`super::term::Term`]s. Each maps to a builtin SMT-LIB sort.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub enum TermType {
    /// `Bool`
    Bool,
    /// `String`
    String,
    /// `RegLan`, regular languages over strings
    RegLan,
}

impl TermType {
    /// The SMT-LIB sort name
    pub fn smt_sort(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::String => "String",
            Self::RegLan => "RegLan",
        }
    }
}
