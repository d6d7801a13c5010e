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

//! Decides whether two sets of cloudsec policies allow the same requests.
//!
//! Policies are compiled into SMT string and regular-expression constraints
//! (see [`compiler`]), and implications between the resulting allow
//! predicates are discharged by racing one or more external SMT solvers
//! (see [`PolicyEquivalenceChecker`]). Each solver runs as a child process
//! speaking SMT-LIB over its standard input and output; `z3` and `cvc5` are
//! supported.
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, rust_2018_idioms)]

mod err;

pub use err::{Error, Result};
mod symcc;
pub use symcc::{
    authorizer, backend, checker, compiler, config, decoder, encoder, env, factory, op, solver,
    term, term_type, verifier,
};
pub use symcc::{EvalError, Interpretation, Model, SmtLibScript};

pub use backend::{BackendKind, BackendRegistry, BackendSelector, ImplResult, SolverBackend};
pub use checker::{Equivalence, PolicyEquivalenceChecker};
pub use config::CheckerConfig;
pub use env::{SymEnv, TupleEncoding};
pub use term::Term;
