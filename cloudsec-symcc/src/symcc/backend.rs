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

//! SMT backends: which solvers exist, where they are installed, and a
//! [`SolverBackend`] that answers implication queries between two policy
//! sets over one solver session.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cloudsec_core::Policy;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use super::authorizer::is_authorized;
use super::decoder::{decode_model, IdMaps};
use super::encoder::Encoder;
use super::env::SymEnv;
use super::interpretation::Model;
use super::smtlib_script::SmtLibScript;
use super::solver::{Decision, Solver};
use super::term::Term;
use super::verifier::verify_terms_imply;
use crate::err::{Error, Result};

/// The supported SMT solvers
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// [Z3](https://github.com/Z3Prover/z3)
    Z3,
    /// [cvc5](https://github.com/cvc5/cvc5)
    Cvc5,
}

impl BackendKind {
    /// Every supported backend
    pub const ALL: [BackendKind; 2] = [BackendKind::Z3, BackendKind::Cvc5];

    /// The backend's name, as accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            Self::Z3 => "z3",
            Self::Cvc5 => "cvc5",
        }
    }

    /// Environment variable that may hold the path of the executable
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Z3 => "Z3",
            Self::Cvc5 => "CVC5",
        }
    }

    /// Name of the executable looked up on the `PATH`
    pub fn binary(self) -> &'static str {
        self.name()
    }

    /// The command that starts `program` as an incremental SMT-LIB session,
    /// with an optional per-query time limit
    pub fn command(self, program: impl AsRef<OsStr>, time_limit: Option<Duration>) -> Command {
        let mut cmd = Command::new(program);
        match self {
            Self::Z3 => {
                cmd.args(["-in", "-smt2"]);
                if let Some(limit) = time_limit {
                    cmd.arg(format!("-t:{}", limit.as_millis()));
                }
            }
            Self::Cvc5 => {
                cmd.args(["--lang", "smt", "--incremental", "--strings-exp"]);
                if let Some(limit) = time_limit {
                    cmd.arg(format!("--tlimit-per={}", limit.as_millis()));
                }
            }
        }
        cmd
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnknownBackend(s.to_string()))
    }
}

/// Which backends a checker races
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum BackendSelector {
    /// Exactly this backend
    One(BackendKind),
    /// Every available backend, written `*`
    All,
}

impl FromStr for BackendSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "*" => Ok(Self::All),
            s => s.parse().map(Self::One),
        }
    }
}

impl TryFrom<String> for BackendSelector {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<BackendSelector> for String {
    fn from(selector: BackendSelector) -> Self {
        selector.to_string()
    }
}

impl From<BackendKind> for BackendSelector {
    fn from(kind: BackendKind) -> Self {
        Self::One(kind)
    }
}

impl fmt::Display for BackendSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(kind) => write!(f, "{kind}"),
            Self::All => write!(f, "*"),
        }
    }
}

/// Looks `binary` up in the directories of the `PATH`
fn find_on_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// The executable for `kind`: `from_env` when it names a file, else the
/// first match on the `PATH`
pub(super) fn locate(kind: BackendKind, from_env: Option<OsString>) -> Option<PathBuf> {
    from_env
        .map(PathBuf::from)
        .filter(|path| {
            let found = path.is_file();
            if !found {
                warn!(
                    backend = %kind,
                    path = %path.display(),
                    "{} does not name a file, ignoring it",
                    kind.env_var()
                );
            }
            found
        })
        .or_else(|| find_on_path(kind.binary()))
}

/// The installed backends and their executables
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    paths: BTreeMap<BackendKind, PathBuf>,
}

impl BackendRegistry {
    /// A registry with no backends
    pub fn empty() -> Self {
        Self::default()
    }

    /// Find the installed backends. A backend's environment variable, when
    /// set, names its executable; otherwise the binary is looked up on the
    /// `PATH`.
    pub fn detect() -> Self {
        let paths = BackendKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let path = locate(kind, std::env::var_os(kind.env_var()))?;
                debug!(backend = %kind, path = %path.display(), "found SMT backend");
                Some((kind, path))
            })
            .collect();
        Self { paths }
    }

    /// This registry with `kind` installed at `path`
    pub fn with(mut self, kind: BackendKind, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(kind, path.into());
        self
    }

    /// Is `kind` installed?
    pub fn is_available(&self, kind: BackendKind) -> bool {
        self.paths.contains_key(&kind)
    }

    /// Executable of `kind`, if installed
    pub fn path(&self, kind: BackendKind) -> Option<&Path> {
        self.paths.get(&kind).map(PathBuf::as_path)
    }

    /// Installed backends, in a fixed order
    pub fn kinds(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.paths.keys().copied()
    }

    /// The backends `selector` picks, failing if any of them is missing
    pub fn resolve(&self, selector: BackendSelector) -> Result<Vec<BackendKind>> {
        match selector {
            BackendSelector::One(kind) if self.is_available(kind) => Ok(vec![kind]),
            BackendSelector::One(kind) => Err(Error::BackendUnavailable { backend: kind }),
            BackendSelector::All => {
                let kinds: Vec<_> = self.kinds().collect();
                if kinds.is_empty() {
                    Err(Error::NoBackendsAvailable)
                } else {
                    Ok(kinds)
                }
            }
        }
    }
}

/// Outcome of one implication query.
///
/// At most one of `proved` and `found_counterexample` is set; neither means
/// the solver was inconclusive. `model` is present iff a counterexample was
/// found.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImplResult {
    /// The implication holds for every request
    pub proved: bool,
    /// Some request separates the two sides
    pub found_counterexample: bool,
    /// A separating request
    pub model: Option<Model>,
}

impl ImplResult {
    /// The implication holds
    pub fn proved() -> Self {
        Self {
            proved: true,
            found_counterexample: false,
            model: None,
        }
    }

    /// The implication fails on `model`
    pub fn counterexample(model: Model) -> Self {
        Self {
            proved: false,
            found_counterexample: true,
            model: Some(model),
        }
    }

    /// The solver could not decide
    pub fn unknown() -> Self {
        Self {
            proved: false,
            found_counterexample: false,
            model: None,
        }
    }

    /// Neither proved nor refuted
    pub fn is_unknown(&self) -> bool {
        !self.proved && !self.found_counterexample
    }
}

/// Set predicates of the two policy sets
#[derive(Debug, Clone)]
struct Encoded {
    p: Term,
    q: Term,
}

/// One solver session answering implication queries between the policy sets
/// `P` and `Q`.
///
/// The first [`SolverBackend::encode`] writes the session header and defines
/// `P`, `Q` and both negated implications at the base level. Each query then
/// asserts its goal inside `(push 1)` / `(pop 1)`, so one session answers any
/// number of queries.
#[derive(Debug)]
pub struct SolverBackend<S> {
    env: SymEnv,
    p: Arc<[Policy]>,
    q: Arc<[Policy]>,
    solver: S,
    terms: BTreeMap<Term, String>,
    encoded: Option<Encoded>,
}

impl<S: Solver> SolverBackend<S> {
    /// A backend over `solver`. Nothing is sent to the solver until the
    /// first call to [`Self::encode`] or a query.
    pub fn new(env: SymEnv, p: Arc<[Policy]>, q: Arc<[Policy]>, solver: S) -> Self {
        Self {
            env,
            p,
            q,
            solver,
            terms: BTreeMap::new(),
            encoded: None,
        }
    }

    /// The symbolic environment
    pub fn env(&self) -> &SymEnv {
        &self.env
    }

    /// The underlying solver
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// The set predicates `(P, Q)`, once encoded
    pub fn predicates(&self) -> Option<(&Term, &Term)> {
        self.encoded.as_ref().map(|e| (&e.p, &e.q))
    }

    /// Compile both policy sets and define their predicates in the solver
    /// session. Idempotent: later calls return the same terms and send
    /// nothing.
    pub async fn encode(&mut self) -> Result<(Term, Term)> {
        if let Some(e) = &self.encoded {
            return Ok((e.p.clone(), e.q.clone()));
        }
        let p = is_authorized(self.p.iter(), &self.env)?;
        let q = is_authorized(self.q.iter(), &self.env)?;
        let input = self.solver.smtlib_input();
        input.set_option("produce-models", "true").await?;
        input.set_logic("ALL").await?;
        let goals: Vec<Term> = [p.clone(), q.clone()]
            .into_iter()
            .chain(verify_terms_imply(&p, &q).iter().cloned())
            .chain(verify_terms_imply(&q, &p).iter().cloned())
            .collect();
        let ids = Encoder::new(&mut self.terms, input).encode(goals.iter()).await?;
        debug!(
            definitions = self.terms.len(),
            ids = ?ids,
            "encoded policy sets"
        );
        self.encoded = Some(Encoded {
            p: p.clone(),
            q: q.clone(),
        });
        Ok((p, q))
    }

    /// Check whether `a` implies `b` by asking whether `¬(a ⇒ b)` is
    /// satisfiable. Encodes the policy sets first if needed.
    pub async fn prove(&mut self, a: &Term, b: &Term) -> Result<ImplResult> {
        self.encode().await?;
        let asserts = verify_terms_imply(a, b);
        let ids = Encoder::new(&mut self.terms, self.solver.smtlib_input())
            .encode(asserts.iter())
            .await?;
        self.solver.smtlib_input().push().await?;
        // popped even when the query fails
        let result = self.query(&ids).await;
        self.solver.smtlib_input().pop().await?;
        result
    }

    /// Assert `ids` in the current scope and read back the verdict
    async fn query(&mut self, ids: &[String]) -> Result<ImplResult> {
        let input = self.solver.smtlib_input();
        for id in ids {
            input.assert(id).await?;
        }
        let decision = self.solver.check_sat().await?;
        debug!(decision = ?decision, "check-sat");
        Ok(match decision {
            Decision::Unsat => ImplResult::proved(),
            Decision::Unknown => ImplResult::unknown(),
            Decision::Sat => {
                let model = match self.solver.get_model().await? {
                    Some(output) => decode_model(&output, &IdMaps::from_terms(&self.terms))?,
                    None => Model::default(),
                };
                ImplResult::counterexample(model)
            }
        })
    }

    /// Does every request allowed by `P` get allowed by `Q`?
    pub async fn p_implies_q(&mut self) -> Result<ImplResult> {
        let (p, q) = self.encode().await?;
        self.prove(&p, &q).await
    }

    /// Does every request allowed by `Q` get allowed by `P`?
    pub async fn q_implies_p(&mut self) -> Result<ImplResult> {
        let (p, q) = self.encode().await?;
        self.prove(&q, &p).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symcc::env::TupleEncoding;
    use crate::symcc::solver::{SolverError, WriterSolver};
    use crate::symcc::DecodeError;
    use cloudsec_core::test_utils::{http_api_type, policy};
    use cool_asserts::assert_matches;

    #[test]
    fn kinds_and_selectors() {
        assert_eq!("z3".parse::<BackendKind>().unwrap(), BackendKind::Z3);
        assert_eq!("cvc5".parse::<BackendKind>().unwrap(), BackendKind::Cvc5);
        assert_matches!("yices".parse::<BackendKind>(), Err(Error::UnknownBackend(s)) => assert_eq!(s, "yices"));
        assert_eq!("*".parse::<BackendSelector>().unwrap(), BackendSelector::All);
        assert_eq!(
            "cvc5".parse::<BackendSelector>().unwrap(),
            BackendSelector::One(BackendKind::Cvc5)
        );
        assert_eq!(BackendSelector::All.to_string(), "*");
        assert_eq!(BackendKind::Cvc5.env_var(), "CVC5");
    }

    #[test]
    fn commands() {
        let cmd = BackendKind::Z3.command("z3", Some(Duration::from_millis(1500)));
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert_eq!(args, ["-in", "-smt2", "-t:1500"]);
        let cmd = BackendKind::Cvc5.command("/opt/cvc5", None);
        assert_eq!(cmd.as_std().get_program(), "/opt/cvc5");
        let args: Vec<_> = cmd.as_std().get_args().collect();
        assert_eq!(args, ["--lang", "smt", "--incremental", "--strings-exp"]);
    }

    #[test]
    fn registry_resolution() {
        let registry = BackendRegistry::empty().with(BackendKind::Z3, "/usr/bin/z3");
        assert_eq!(
            registry.resolve(BackendSelector::All).unwrap(),
            [BackendKind::Z3]
        );
        assert_eq!(
            registry.resolve(BackendKind::Z3.into()).unwrap(),
            [BackendKind::Z3]
        );
        assert_matches!(
            registry.resolve(BackendKind::Cvc5.into()),
            Err(Error::BackendUnavailable {
                backend: BackendKind::Cvc5
            })
        );
        assert_matches!(
            BackendRegistry::empty().resolve(BackendSelector::All),
            Err(Error::NoBackendsAvailable)
        );
    }

    #[test]
    fn env_paths_must_name_files() {
        let dir = std::env::temp_dir();
        // a directory is not an executable; fall back to the PATH lookup
        assert_eq!(
            locate(BackendKind::Z3, Some(dir.clone().into_os_string())),
            find_on_path("z3")
        );
        assert_eq!(
            locate(
                BackendKind::Cvc5,
                Some("/nonexistent/cloudsec/cvc5".into())
            ),
            find_on_path("cvc5")
        );

        let file = dir.join(format!("cloudsec-locate-{}", std::process::id()));
        std::fs::write(&file, "").unwrap();
        assert_eq!(
            locate(BackendKind::Z3, Some(file.clone().into_os_string())),
            Some(file.clone())
        );
        std::fs::remove_file(file).unwrap();
    }

    /// Answers `sat` to every query and a model that does not parse
    struct GarbledModelSolver {
        w: Vec<u8>,
    }

    impl Solver for GarbledModelSolver {
        fn smtlib_input(&mut self) -> &mut (dyn tokio::io::AsyncWrite + Unpin + Send) {
            &mut self.w
        }

        async fn check_sat(&mut self) -> std::result::Result<Decision, SolverError> {
            self.smtlib_input().check_sat().await?;
            Ok(Decision::Sat)
        }

        async fn get_model(&mut self) -> std::result::Result<Option<String>, SolverError> {
            self.smtlib_input().get_model().await?;
            Ok(Some("((define-fun t0 () String".into()))
        }
    }

    #[tokio::test]
    async fn failed_queries_pop_their_scope() {
        let (env, p, q) = policy_sets();
        let mut backend = SolverBackend::new(env, p, q, GarbledModelSolver { w: Vec::new() });
        assert_matches!(
            backend.q_implies_p().await,
            Err(Error::Decode(DecodeError::UnexpectedEnd))
        );
        assert_matches!(
            backend.p_implies_q().await,
            Err(Error::Decode(DecodeError::UnexpectedEnd))
        );
        let script = String::from_utf8(backend.solver().w.clone()).unwrap();
        assert_eq!(script.matches("(push 1)").count(), 2);
        assert_eq!(script.matches("(pop 1)").count(), 2);
        assert_eq!(script.matches("(get-model)\n(pop 1)\n").count(), 2);
    }

    /// P allows `GET` on `s2/*`, Q allows every action there
    fn policy_sets() -> (SymEnv, Arc<[Policy]>, Arc<[Policy]>) {
        let ty = Arc::new(http_api_type());
        let env = SymEnv::new(ty.clone(), TupleEncoding::PerField);
        let p: Arc<[Policy]> = Arc::from([policy(
            &ty,
            ("a2cps", "jstubbs"),
            ("a2cps", "files", "s2/*"),
            "GET",
            "allow",
        )]);
        let q: Arc<[Policy]> = Arc::from([policy(
            &ty,
            ("a2cps", "jstubbs"),
            ("a2cps", "files", "s2/*"),
            "*",
            "allow",
        )]);
        (env, p, q)
    }

    fn writer_backend() -> SolverBackend<WriterSolver<Vec<u8>>> {
        let (env, p, q) = policy_sets();
        SolverBackend::new(env, p, q, WriterSolver { w: Vec::new() })
    }

    #[tokio::test]
    async fn encode_is_idempotent() {
        let mut backend = writer_backend();
        let first = backend.encode().await.unwrap();
        let script = backend.solver().w.clone();
        let second = backend.encode().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.solver().w, script);
        let script = String::from_utf8(script).unwrap();
        assert!(script.starts_with("(set-option :produce-models true)\n(set-logic ALL)\n"));
        // one declaration per free variable
        assert_eq!(script.matches("declare-const").count(), 6);
        assert!(!script.contains("(assert"));
    }

    #[tokio::test]
    async fn queries_are_scoped() {
        let mut backend = writer_backend();
        backend.encode().await.unwrap();
        let before = backend.solver().w.len();
        // the writer answers `unknown` to everything
        assert_eq!(backend.p_implies_q().await.unwrap(), ImplResult::unknown());
        assert_eq!(backend.q_implies_p().await.unwrap(), ImplResult::unknown());
        let queries = String::from_utf8(backend.solver().w.get(before..).unwrap().to_vec()).unwrap();
        // the negated implications were defined up front
        assert!(!queries.contains("define-fun"));
        assert_eq!(queries.matches("(push 1)\n(assert t").count(), 2);
        assert_eq!(queries.matches("(check-sat)\n(pop 1)\n").count(), 2);
    }

    #[test]
    fn impl_results() {
        assert!(ImplResult::unknown().is_unknown());
        assert!(!ImplResult::proved().is_unknown());
        let r = ImplResult::counterexample([("action", "PUT")].into_iter().collect());
        assert!(r.found_counterexample && !r.proved);
        assert_eq!(r.model.unwrap().get("action"), Some("PUT"));
    }
}
