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

use cloudsec_core::{Decision, Policy};

use crate::symcc::{
    compiler::{compile_policy, CompileError},
    env::SymEnv,
    factory::{and, any_true, not},
    term::Term,
};

pub fn satisfied_with_decision(
    decision: Decision,
    policy: &Policy,
    env: &SymEnv,
) -> Result<Option<Term>, CompileError> {
    if policy.decision() == decision {
        Ok(Some(compile_policy(policy, env)?))
    } else {
        Ok(None)
    }
}

/// Disjunction of the policies with the given decision
pub fn satisfied_policies<'a>(
    decision: Decision,
    policies: impl IntoIterator<Item = &'a Policy>,
    env: &SymEnv,
) -> Result<Term, CompileError> {
    let terms = policies
        .into_iter()
        .filter_map(|p| satisfied_with_decision(decision, p, env).transpose())
        .collect::<Result<Vec<Term>, CompileError>>()?;
    Ok(any_true(terms))
}

/// A request is authorized when some allow policy matches it and no deny
/// policy does.
pub fn is_authorized<'a>(
    policies: impl IntoIterator<Item = &'a Policy> + Clone,
    env: &SymEnv,
) -> Result<Term, CompileError> {
    let denies = satisfied_policies(Decision::Deny, policies.clone(), env)?;
    let allows = satisfied_policies(Decision::Allow, policies, env)?;
    Ok(and(allows, not(denies)))
}
