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
#![allow(clippy::panic, clippy::unwrap_used, reason = "test code")]
#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]

//! Utilities shared by the tests in this directory

use std::sync::Arc;

use cloudsec_core::{Policy, PolicyType};
use cloudsec_symcc::authorizer::is_authorized;
use cloudsec_symcc::{
    BackendKind, BackendRegistry, CheckerConfig, ImplResult, Interpretation, Model,
    PolicyEquivalenceChecker, SymEnv, TupleEncoding,
};

#[track_caller]
pub fn pretty_panic<T>(e: impl miette::Diagnostic + Send + Sync + 'static) -> T {
    panic!("{:?}", miette::Report::new(e))
}

/// Set to run the solver tests as no-ops on a machine without a solver
pub const SKIP_SOLVER_TESTS: &str = "CLOUDSEC_SKIP_SOLVER_TESTS";

/// Installed backends. Tests that need a solver loop over these. Without
/// `z3` or `cvc5` installed this panics, unless [`SKIP_SOLVER_TESTS`] is set.
pub fn backends() -> Vec<BackendKind> {
    let kinds: Vec<_> = BackendRegistry::detect().kinds().collect();
    if kinds.is_empty() {
        assert!(
            std::env::var_os(SKIP_SOLVER_TESTS).is_some(),
            "no SMT solver found; install z3 or cvc5, point the Z3 or CVC5 \
             environment variable at one, or set {SKIP_SOLVER_TESTS} to skip"
        );
        eprintln!("no SMT solver installed; skipping solver checks");
    }
    kinds
}

/// A checker racing only `kind`
pub async fn checker(
    policy_type: &Arc<PolicyType>,
    p: &[Policy],
    q: &[Policy],
    kind: BackendKind,
) -> PolicyEquivalenceChecker {
    PolicyEquivalenceChecker::new(
        policy_type.clone(),
        p.to_vec(),
        q.to_vec(),
        kind.into(),
        CheckerConfig::default(),
    )
    .await
    .unwrap_or_else(pretty_panic)
}

/// Does `policies` allow the request described by `model`?
pub fn allows(
    policy_type: &Arc<PolicyType>,
    encoding: TupleEncoding,
    policies: &[Policy],
    model: &Model,
) -> bool {
    let env = SymEnv::new(policy_type.clone(), encoding);
    let term = is_authorized(policies, &env).unwrap_or_else(pretty_panic);
    Interpretation::new(model)
        .eval(&term)
        .unwrap_or_else(pretty_panic)
}

#[track_caller]
pub fn assert_proved(kind: BackendKind, result: &ImplResult) {
    assert!(
        result.proved && !result.found_counterexample && result.model.is_none(),
        "{kind}: expected a proof, got {result:?}"
    );
}

/// Asserts that `result` is a counterexample to `a ⇒ b` and that its model
/// really is allowed by `a` and not by `b`. Returns the model.
#[track_caller]
pub fn assert_counterexample(
    kind: BackendKind,
    policy_type: &Arc<PolicyType>,
    result: &ImplResult,
    a: &[Policy],
    b: &[Policy],
) -> Model {
    assert!(
        !result.proved && result.found_counterexample,
        "{kind}: expected a counterexample, got {result:?}"
    );
    let model = result
        .model
        .clone()
        .unwrap_or_else(|| panic!("{kind}: counterexample without a model"));
    assert!(
        allows(policy_type, TupleEncoding::PerField, a, &model),
        "{kind}: {model} is not allowed by the antecedent"
    );
    assert!(
        !allows(policy_type, TupleEncoding::PerField, b, &model),
        "{kind}: {model} is allowed by the consequent"
    );
    model
}
