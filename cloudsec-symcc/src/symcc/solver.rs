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

//! A simple interface to an SMT solver.
//!
//! Callers communicate with the solver by issuing commands with s-expressions
//! encoded as strings. The interface is based on
//! [lean-smt](https://github.com/ufmg-smite/lean-smt/).
//!
//! Two solvers are supported, each running locally in a separate process:
//! `LocalSolver::z3()` and `LocalSolver::cvc5()`. The executable is taken from
//! the `Z3` / `CVC5` environment variable if set, or looked up on the `PATH`
//! otherwise. Both are started in incremental mode so one process can answer
//! any number of `(push)`/`(pop)` scoped queries.

use super::backend::BackendKind;
use super::smtlib_script::SmtLibScript;
use miette::Diagnostic;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Satisfiability decision from the SMT solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd)]
#[allow(missing_docs, reason = "self-explanatory")]
pub enum Decision {
    Sat,
    Unsat,
    Unknown,
}

/// Errors when interacting with a [`Solver`] instance.
#[derive(Debug, Diagnostic, Error)]
pub enum SolverError {
    /// IO error.
    #[error("IO error during a solver operation")]
    Io(#[from] std::io::Error),
    /// Error from the solver.
    #[error("solver error: {0}")]
    Solver(String),
    /// Unrecognized solver output.
    #[error("unrecognized solver output: {0}")]
    UnrecognizedSolverOutput(String),
}
type Result<T> = std::result::Result<T, SolverError>;

/// Trait for things which are capable of solving SMTLib queries
pub trait Solver {
    /// Get the input stream for the solver, so that you can write (more) input
    /// to it. This input is expected to be in SMTLib format.
    ///
    /// Returns a `&mut dyn tokio::io::AsyncWrite`, which gets the methods in
    /// the trait `SmtLibScript` for free, as long as the `SmtLibScript` trait
    /// is brought into scope.
    fn smtlib_input(&mut self) -> &mut (dyn tokio::io::AsyncWrite + Unpin + Send);
    /// Execute the query that has been written via `smtlib_input()`,
    /// returning the `Decision`.
    ///
    /// This function is also responsible for adding `SmtLibScript::check_sat()`.
    fn check_sat(&mut self) -> impl Future<Output = Result<Decision>> + Send;
    /// Call `(get-model)` and return the SMT model as a string.
    fn get_model(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// A solver instance that communicates with a local SMT solver process
/// through stdin/stdout. The process is killed when the solver is dropped.
///
/// Examples:
/// ```no_run
/// use tokio::process::Command;
/// use cloudsec_symcc::solver::LocalSolver;
///
/// // Spawns a z3 process with the default arguments
/// let solver = LocalSolver::z3(None).unwrap();
///
/// // Spawns a custom solver process
/// let solver = LocalSolver::from_command(Command::new("z3").args(["-in", "-smt2"])).unwrap();
/// ```
#[derive(Debug)]
pub struct LocalSolver {
    /// The spawned solver process.
    child: Child,
    solver_stdin: BufWriter<ChildStdin>,
    solver_stdout: BufReader<ChildStdout>,
}

impl LocalSolver {
    /// Creates a new [`LocalSolver`] from a custom [`Command`].
    ///
    /// The input command is expected to behave as an interactive SMT solver
    /// that reads queries from stdin in SMT-LIB 2 format (e.g., `cvc5 --lang smt` or `z3 -in`).
    pub fn from_command(cmd: &mut Command) -> Result<Self> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(SolverError::Solver(
                    "Failed to fetch IO pipes for solver process".into(),
                ))
            }
        };
        Ok(Self {
            solver_stdin: BufWriter::new(stdin),
            solver_stdout: BufReader::new(stdout),
            child,
        })
    }

    /// Spawns a z3 solver process by looking up the executable using the
    /// `Z3` environment variable or the `z3` binary in `PATH`.
    pub fn z3(time_limit: Option<Duration>) -> Result<Self> {
        Self::of_kind(BackendKind::Z3, time_limit)
    }

    /// Spawns a cvc5 solver process by looking up the executable using the
    /// `CVC5` environment variable or the `cvc5` binary in `PATH`.
    pub fn cvc5(time_limit: Option<Duration>) -> Result<Self> {
        Self::of_kind(BackendKind::Cvc5, time_limit)
    }

    fn of_kind(kind: BackendKind, time_limit: Option<Duration>) -> Result<Self> {
        let path = super::backend::locate(kind, std::env::var_os(kind.env_var()))
            .unwrap_or_else(|| kind.binary().into());
        Self::from_command(&mut kind.command(path, time_limit))
    }
}

impl Solver for LocalSolver {
    fn smtlib_input(&mut self) -> &mut (dyn tokio::io::AsyncWrite + Unpin + Send) {
        &mut self.solver_stdin
    }

    async fn check_sat(&mut self) -> Result<Decision> {
        self.check_alive()?;
        self.smtlib_input().check_sat().await?;
        self.solver_stdin.flush().await?;
        let mut output = String::new();
        self.read_line(&mut output).await?;
        match output.trim_end() {
            "sat" => Ok(Decision::Sat),
            "unsat" => Ok(Decision::Unsat),
            "unknown" | "timeout" => Ok(Decision::Unknown),
            s => Err(Self::process_error_output(s)),
        }
    }

    async fn get_model(&mut self) -> Result<Option<String>> {
        self.check_alive()?;
        self.smtlib_input().get_model().await?;
        self.solver_stdin.flush().await?;
        let mut output = String::new();

        // The model is one s-expression, possibly spread over several lines
        // (z3 and cvc5 lay it out differently), so read until the parentheses
        // balance.
        let mut depth = 0i64;
        let mut in_string = false;
        loop {
            let start = output.len();
            self.read_line(&mut output).await?;
            for c in output.get(start..).unwrap_or_default().chars() {
                match c {
                    '"' => in_string = !in_string,
                    '(' if !in_string => depth += 1,
                    ')' if !in_string => depth -= 1,
                    _ => {}
                }
            }
            if depth <= 0 && !output.trim().is_empty() {
                break;
            }
        }
        if output.trim_start().starts_with("(error") {
            Err(Self::process_error_output(output.trim_end()))
        } else {
            Ok(Some(output))
        }
    }
}

impl LocalSolver {
    fn check_alive(&mut self) -> Result<()> {
        match self.child.try_wait()? {
            Some(status) => Err(SolverError::Solver(format!(
                "Solver process terminated unexpectedly with status: {:?}",
                status.code()
            ))),
            None => Ok(()),
        }
    }

    async fn read_line(&mut self, buffer: &mut String) -> Result<usize> {
        let len = self.solver_stdout.read_line(buffer).await?;
        if len == 0 {
            Err(SolverError::Solver(
                "Encountered EOF while reading from solver output".to_string(),
            ))
        } else {
            Ok(len)
        }
    }

    fn process_error_output(s: &str) -> SolverError {
        match s.strip_prefix("(error \"") {
            Some(e) => SolverError::Solver(e.strip_suffix("\")").unwrap_or(e).to_string()),
            None => SolverError::UnrecognizedSolverOutput(s.to_string()),
        }
    }

    /// Forces this solver's child process to exit.
    /// Waits for the child to exit completely.
    pub async fn clean_up(mut self) -> Result<()> {
        self.child.kill().await.map_err(|e| e.into())
    }
}

/// Implements `Solver` by writing all issued commands to the given
/// `tokio::io::AsyncWrite`.
/// `check_sat()` writes the command to `w` and then returns `Decision::Unknown`,
/// which is sound but not very useful.
/// The purpose of this is for testing that only cares about the contents of the
/// script.
#[derive(Debug)]
pub struct WriterSolver<W> {
    /// where the `WriterSolver` will write the SMTLib commands to
    pub w: W,
}

impl<W: tokio::io::AsyncWrite + Unpin + Send> Solver for WriterSolver<W> {
    fn smtlib_input(&mut self) -> &mut (dyn tokio::io::AsyncWrite + Unpin + Send) {
        &mut self.w
    }
    async fn check_sat(&mut self) -> Result<Decision> {
        self.smtlib_input().check_sat().await?;
        self.w.flush().await?;
        Ok(Decision::Unknown)
    }
    async fn get_model(&mut self) -> Result<Option<String>> {
        self.smtlib_input().get_model().await?;
        self.w.flush().await?;
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use cool_asserts::assert_matches;

    use super::*;
    use crate::symcc::backend::BackendRegistry;

    /// Solvers installed on this machine
    fn solvers() -> Vec<LocalSolver> {
        let registry = BackendRegistry::detect();
        [BackendKind::Z3, BackendKind::Cvc5]
            .into_iter()
            .filter_map(|kind| {
                let path = registry.path(kind)?;
                LocalSolver::from_command(&mut kind.command(path, None)).ok()
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_run() {
        for mut solver in solvers() {
            assert_eq!(solver.check_sat().await.unwrap(), Decision::Sat);
        }
    }

    #[tokio::test]
    async fn comment_escaping_test() {
        for mut solver in solvers() {
            solver
                .smtlib_input()
                .comment("\n(assert false)")
                .await
                .unwrap();
            assert_eq!(solver.check_sat().await.unwrap(), Decision::Sat);
        }
    }

    #[tokio::test]
    async fn push_pop() {
        for mut solver in solvers() {
            let input = solver.smtlib_input();
            input.set_logic("ALL").await.unwrap();
            input.push().await.unwrap();
            input.assert("false").await.unwrap();
            assert_eq!(solver.check_sat().await.unwrap(), Decision::Unsat);
            solver.smtlib_input().pop().await.unwrap();
            assert_eq!(solver.check_sat().await.unwrap(), Decision::Sat);
        }
    }

    #[tokio::test]
    async fn get_model_sat() {
        for mut solver in solvers() {
            let input = solver.smtlib_input();
            input.set_option("produce-models", "true").await.unwrap();
            input.set_logic("ALL").await.unwrap();
            input.declare_const("t0", "String").await.unwrap();
            input
                .assert("(str.in_re t0 (str.to_re \"a(b\"))")
                .await
                .unwrap();
            assert_eq!(solver.check_sat().await.unwrap(), Decision::Sat);
            let model = solver.get_model().await.unwrap().unwrap();
            assert!(model.contains("a(b"), "{model}");
            // the session is still usable afterwards
            assert_eq!(solver.check_sat().await.unwrap(), Decision::Sat);
        }
    }

    #[tokio::test]
    async fn get_model_unsat() {
        for mut solver in solvers() {
            let input = solver.smtlib_input();
            input.set_option("produce-models", "true").await.unwrap();
            input.assert("false").await.unwrap();
            assert_eq!(solver.check_sat().await.unwrap(), Decision::Unsat);
            assert!(solver.get_model().await.is_err());
        }
    }

    #[tokio::test]
    async fn parse_error_test() {
        for mut solver in solvers() {
            solver.smtlib_input().assert("tomato").await.unwrap();
            assert_matches!(solver.check_sat().await, Err(SolverError::Solver(_)));
        }
    }

    #[tokio::test]
    async fn clean_up_succeeds() {
        for solver in solvers() {
            solver.clean_up().await.unwrap();
        }
    }

    #[tokio::test]
    async fn writer_solver() {
        let mut solver = WriterSolver { w: Vec::<u8>::new() };
        solver.smtlib_input().assert("true").await.unwrap();
        assert_eq!(solver.check_sat().await.unwrap(), Decision::Unknown);
        assert_eq!(solver.get_model().await.unwrap(), None);
        assert_eq!(
            String::from_utf8(solver.w).unwrap(),
            "(assert true)\n(check-sat)\n(get-model)\n"
        );
    }
}
