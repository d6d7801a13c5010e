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

//! Symbolic compilation of cloudsec policies into SMT terms, and the
//! machinery to hand those terms to a solver.

pub mod authorizer;
pub mod backend;
pub mod checker;
pub mod compiler;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod env;
pub mod factory;
pub mod interpretation;
pub mod op;
pub mod smtlib_script;
pub mod solver;
pub mod term;
pub mod term_type;
pub mod verifier;

pub use compiler::CompileError;
pub use decoder::DecodeError;
pub use encoder::EncodeError;
pub use interpretation::{EvalError, Interpretation, Model};
pub use smtlib_script::SmtLibScript;
pub use solver::SolverError;
