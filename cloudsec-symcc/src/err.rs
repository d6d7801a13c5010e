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

//! All error types in the symbolic checker.

use std::time::Duration;

use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

pub use crate::symcc::{CompileError, DecodeError, EncodeError, SolverError};
use crate::symcc::backend::BackendKind;

/// Top-level errors from the whole `cloudsec-symcc` crate.
#[derive(Debug, Diagnostic, Error)]
pub enum Error {
    /// Errors during symbolic compilation.
    #[error("symbolic compilation failed: {0}")]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),
    /// Errors from the SMT encoder.
    #[error("failed to encode SMT terms: {0}")]
    Encode(#[from] EncodeError),
    /// Solver-related errors.
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// Failed to decode the SMT model.
    #[error("failed to decode model: {0}")]
    Decode(#[from] DecodeError),
    /// A requested backend is not installed.
    #[error("SMT backend `{backend}` is not available")]
    #[diagnostic(help(
        "install `{backend}` on the PATH, or set the environment variable naming its executable"
    ))]
    BackendUnavailable {
        /// The requested backend
        backend: BackendKind,
    },
    /// A backend name that is neither `z3`, `cvc5` nor `*`.
    #[error("unknown SMT backend `{0}`; expected `z3`, `cvc5` or `*`")]
    UnknownBackend(String),
    /// The `*` selector found no installed backend.
    #[error("no SMT backend is available")]
    NoBackendsAvailable,
    /// No worker concluded within the allotted time.
    #[error("no SMT backend concluded within {timeout:?}")]
    Timeout {
        /// The time allotted to the query
        timeout: Duration,
    },
    /// Every worker failed; this is the last failure reported.
    #[error("SMT backend `{backend}` failed: {reason}")]
    WorkerFailed {
        /// The failing backend
        backend: BackendKind,
        /// What went wrong
        reason: String,
    },
    /// Every worker stopped without reporting a result.
    #[error("every SMT worker stopped without an answer")]
    AllWorkersFailed,
    /// A policy's type differs from the checker's policy type.
    #[error("policy of type `{found}` given to a checker for policy type `{expected}`")]
    PolicyTypeMismatch {
        /// The checker's policy type
        expected: SmolStr,
        /// The policy's type
        found: SmolStr,
    },
}

/// Writes to a solver's input surface as [`SolverError::Io`].
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Solver(SolverError::Io(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;
    use cool_asserts::assert_matches;

    fn write_failed() -> Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))?;
        Ok(())
    }

    #[test]
    fn io_errors_are_solver_errors() {
        assert_matches!(
            write_failed(),
            Err(Error::Solver(SolverError::Io(e))) => {
                assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe);
            }
        );
    }
}
