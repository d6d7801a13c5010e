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

//! Races several SMT backends on implication queries between two policy
//! sets.
//!
//! Each selected backend runs in its own worker task, which owns a solver
//! process and a [`SolverBackend`] session. A query is sent to every worker;
//! the first conclusive answer wins. Workers that lost the race are
//! cancelled, which drops their solver process and kills it, and fresh
//! workers are started in their place. On timeout every worker is replaced.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloudsec_symcc::{BackendSelector, CheckerConfig, PolicyEquivalenceChecker};
//! # async fn example(
//! #     policy_type: Arc<cloudsec_core::PolicyType>,
//! #     p: Vec<cloudsec_core::Policy>,
//! #     q: Vec<cloudsec_core::Policy>,
//! # ) -> cloudsec_symcc::Result<()> {
//! let mut checker = PolicyEquivalenceChecker::new(
//!     policy_type,
//!     p,
//!     q,
//!     BackendSelector::All,
//!     CheckerConfig::default(),
//! )
//! .await?;
//! let (backend, result) = checker.p_implies_q(None).await?;
//! println!("{backend}: proved = {}", result.proved);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudsec_core::{Policy, PolicyType};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::authorizer::is_authorized;
use super::backend::{BackendKind, BackendRegistry, BackendSelector, ImplResult, SolverBackend};
use super::config::CheckerConfig;
use super::env::SymEnv;
use super::solver::LocalSolver;
use crate::err::{Error, Result};

/// A query a worker can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Query {
    Encode,
    PImpliesQ,
    QImpliesP,
}

#[derive(Debug)]
enum Answer {
    Encoded,
    Implication(ImplResult),
}

type Reply = (BackendKind, Result<Answer>);

#[derive(Debug)]
struct WorkerCommand {
    query: Query,
    reply: mpsc::Sender<Reply>,
}

#[derive(Debug)]
struct Worker {
    kind: BackendKind,
    path: PathBuf,
    commands: mpsc::Sender<WorkerCommand>,
    cancel: CancellationToken,
}

/// What every worker needs to build its session
#[derive(Debug, Clone)]
struct Inputs {
    env: SymEnv,
    p: Arc<[Policy]>,
    q: Arc<[Policy]>,
    time_limit: Option<Duration>,
}

impl Worker {
    fn spawn(kind: BackendKind, path: PathBuf, inputs: Inputs) -> Self {
        let (commands, receiver) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_path = path.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(backend = %kind, "SMT worker cancelled");
                }
                _ = serve(kind, task_path, inputs, receiver) => {}
            }
        });
        Self {
            kind,
            path,
            commands,
            cancel,
        }
    }
}

/// Start a session and answer commands until the checker goes away
async fn serve(
    kind: BackendKind,
    path: PathBuf,
    inputs: Inputs,
    mut commands: mpsc::Receiver<WorkerCommand>,
) {
    let started = async {
        let solver = LocalSolver::from_command(&mut kind.command(&path, inputs.time_limit))?;
        let mut backend = SolverBackend::new(inputs.env, inputs.p, inputs.q, solver);
        backend.encode().await?;
        Ok::<_, Error>(backend)
    }
    .await;

    let mut backend = match started {
        Ok(backend) => backend,
        Err(e) => {
            error!(backend = %kind, path = %path.display(), error = %e, "SMT worker failed to start");
            let reason = e.to_string();
            while let Some(cmd) = commands.recv().await {
                let failure = Error::WorkerFailed {
                    backend: kind,
                    reason: reason.clone(),
                };
                // the checker may have stopped listening
                let _ = cmd.reply.send((kind, Err(failure))).await;
            }
            return;
        }
    };

    while let Some(cmd) = commands.recv().await {
        let started = Instant::now();
        let result = match cmd.query {
            Query::Encode => backend.encode().await.map(|_| Answer::Encoded),
            Query::PImpliesQ => backend.p_implies_q().await.map(Answer::Implication),
            Query::QImpliesP => backend.q_implies_p().await.map(Answer::Implication),
        };
        debug!(
            backend = %kind,
            query = ?cmd.query,
            elapsed_ms = started.elapsed().as_millis(),
            "SMT worker answered"
        );
        if cmd.reply.send((kind, result)).await.is_err() {
            debug!(backend = %kind, query = ?cmd.query, "late answer dropped");
        }
    }
}

/// Both directions of an equivalence check
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Equivalence {
    /// Winning backend and result for `P ⇒ Q`
    pub p_implies_q: (BackendKind, ImplResult),
    /// Winning backend and result for `Q ⇒ P`
    pub q_implies_p: (BackendKind, ImplResult),
}

impl Equivalence {
    /// Both implications were proved
    pub fn is_equivalent(&self) -> bool {
        self.p_implies_q.1.proved && self.q_implies_p.1.proved
    }
}

/// Decides implications between two policy sets `P` and `Q` of one policy
/// type by racing one or more SMT backends.
///
/// Queries on one checker must be issued one at a time.
#[derive(Debug)]
pub struct PolicyEquivalenceChecker {
    policy_type: Arc<PolicyType>,
    inputs: Inputs,
    config: CheckerConfig,
    workers: Vec<Worker>,
    encoded: bool,
}

impl PolicyEquivalenceChecker {
    /// A checker racing the backends `selector` picks among those installed
    /// on this machine.
    ///
    /// Fails if a selected backend is not installed or if a policy is not of
    /// `policy_type`.
    pub async fn new(
        policy_type: Arc<PolicyType>,
        p: impl IntoIterator<Item = Policy>,
        q: impl IntoIterator<Item = Policy>,
        selector: BackendSelector,
        config: CheckerConfig,
    ) -> Result<Self> {
        Self::with_registry(
            policy_type,
            p,
            q,
            selector,
            config,
            &BackendRegistry::detect(),
        )
        .await
    }

    /// Like [`Self::new`], but picking backends from `registry`
    pub async fn with_registry(
        policy_type: Arc<PolicyType>,
        p: impl IntoIterator<Item = Policy>,
        q: impl IntoIterator<Item = Policy>,
        selector: BackendSelector,
        config: CheckerConfig,
        registry: &BackendRegistry,
    ) -> Result<Self> {
        let p: Arc<[Policy]> = p.into_iter().collect();
        let q: Arc<[Policy]> = q.into_iter().collect();
        if let Some(other) = p
            .iter()
            .chain(q.iter())
            .map(Policy::policy_type)
            .find(|ty| ***ty != *policy_type)
        {
            return Err(Error::PolicyTypeMismatch {
                expected: policy_type.name().clone(),
                found: other.name().clone(),
            });
        }
        let kinds = registry.resolve(selector)?;
        let inputs = Inputs {
            env: SymEnv::new(policy_type.clone(), config.tuple_encoding),
            p,
            q,
            time_limit: config.solver_time_limit,
        };
        let workers = kinds
            .into_iter()
            .filter_map(|kind| {
                let path = registry.path(kind)?.to_path_buf();
                Some(Worker::spawn(kind, path, inputs.clone()))
            })
            .collect::<Vec<_>>();
        info!(
            policy_type = %policy_type.name(),
            backends = ?workers.iter().map(|w| w.kind).collect::<Vec<_>>(),
            "started policy equivalence checker"
        );
        Ok(Self {
            policy_type,
            inputs,
            config,
            workers,
            encoded: false,
        })
    }

    /// The policy type both sets belong to
    pub fn policy_type(&self) -> &Arc<PolicyType> {
        &self.policy_type
    }

    /// The backends being raced
    pub fn backends(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.workers.iter().map(|w| w.kind)
    }

    /// Compile both policy sets and wait until some worker has encoded them.
    /// Compilation errors are reported here, before any solver is involved.
    pub async fn encode(&mut self) -> Result<BackendKind> {
        is_authorized(self.inputs.p.iter(), &self.inputs.env)?;
        is_authorized(self.inputs.q.iter(), &self.inputs.env)?;
        let (kind, _) = self.race(Query::Encode, None).await?;
        self.encoded = true;
        Ok(kind)
    }

    /// Does every request allowed by `P` get allowed by `Q`? Waits at most
    /// `timeout`, or the configured default.
    pub async fn p_implies_q(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<(BackendKind, ImplResult)> {
        self.implication(Query::PImpliesQ, timeout).await
    }

    /// Does every request allowed by `Q` get allowed by `P`? Waits at most
    /// `timeout`, or the configured default.
    pub async fn q_implies_p(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<(BackendKind, ImplResult)> {
        self.implication(Query::QImpliesP, timeout).await
    }

    /// Both implications, one after the other
    pub async fn check_equivalent(&mut self, timeout: Option<Duration>) -> Result<Equivalence> {
        Ok(Equivalence {
            p_implies_q: self.p_implies_q(timeout).await?,
            q_implies_p: self.q_implies_p(timeout).await?,
        })
    }

    async fn implication(
        &mut self,
        query: Query,
        timeout: Option<Duration>,
    ) -> Result<(BackendKind, ImplResult)> {
        if !self.encoded {
            self.encode().await?;
        }
        match self.race(query, timeout).await? {
            (kind, Answer::Implication(result)) => Ok((kind, result)),
            (kind, Answer::Encoded) => Err(Error::WorkerFailed {
                backend: kind,
                reason: format!("answered `encode` to {query:?}"),
            }),
        }
    }

    /// Send `query` to every worker and return the first successful answer
    async fn race(&mut self, query: Query, timeout: Option<Duration>) -> Result<(BackendKind, Answer)> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let (reply, mut replies) = mpsc::channel(self.workers.len().max(1));
        for worker in &self.workers {
            let cmd = WorkerCommand {
                query,
                reply: reply.clone(),
            };
            if worker.commands.send(cmd).await.is_err() {
                warn!(backend = %worker.kind, "SMT worker is gone");
            }
        }
        drop(reply);
        info!(query = ?query, workers = self.workers.len(), "dispatched query");

        let started = Instant::now();
        let mut last_failure = None;
        let outcome = tokio::time::timeout(timeout, async {
            while let Some((kind, result)) = replies.recv().await {
                match result {
                    Ok(answer) => return Some((kind, answer)),
                    Err(e) => {
                        warn!(backend = %kind, query = ?query, error = %e, "SMT worker failed");
                        last_failure = Some(match e {
                            Error::WorkerFailed { .. } => e,
                            e => Error::WorkerFailed {
                                backend: kind,
                                reason: e.to_string(),
                            },
                        });
                    }
                }
            }
            None
        })
        .await;

        match outcome {
            Ok(Some((kind, answer))) => {
                info!(
                    backend = %kind,
                    query = ?query,
                    elapsed_ms = started.elapsed().as_millis(),
                    "SMT backend won"
                );
                // workers that lost an encode race still finish encoding
                if query != Query::Encode && self.workers.len() > 1 {
                    self.respawn(|w| w.kind != kind);
                }
                Ok((kind, answer))
            }
            Ok(None) => {
                self.respawn(|_| true);
                Err(last_failure.unwrap_or(Error::AllWorkersFailed))
            }
            Err(_) => {
                warn!(query = ?query, timeout_ms = timeout.as_millis(), "query timed out");
                self.respawn(|_| true);
                Err(Error::Timeout { timeout })
            }
        }
    }

    /// Cancel and replace the workers matching `pred`
    fn respawn(&mut self, pred: impl Fn(&Worker) -> bool) {
        for worker in self.workers.iter_mut().filter(|w| pred(w)) {
            warn!(backend = %worker.kind, "replacing SMT worker");
            worker.cancel.cancel();
            *worker = Worker::spawn(worker.kind, worker.path.clone(), self.inputs.clone());
        }
    }
}

impl Drop for PolicyEquivalenceChecker {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.cancel.cancel();
        }
    }
}
