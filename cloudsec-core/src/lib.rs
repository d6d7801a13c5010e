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

//! Policy data model for cloudsec.
//!
//! A [`PolicyType`] describes the universe of values a policy may take as an
//! ordered list of named [`ComponentSchema`]s. A [`Policy`] is one validated
//! value of a policy type together with an allow/deny [`Decision`]. The
//! symbolic compiler in `cloudsec-symcc` turns lists of policies into SMT
//! constraints; this crate only knows about the data.
#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod ast;
pub use ast::*;
pub mod charset;
pub use charset::{ALPHANUM_SET, PATH_CHAR_SET};

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;
