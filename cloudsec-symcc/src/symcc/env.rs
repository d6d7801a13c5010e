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

//! The symbolic environment: one free string variable per component of a
//! policy type.

use std::collections::BTreeMap;
use std::sync::Arc;

use cloudsec_core::{ComponentKind, PolicyType};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::term::{Term, TermVar};
use super::term_type::TermType;

/// How tuple components are bound to free variables.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum TupleEncoding {
    /// One free variable per leaf field, named `{tuple}_{field}`.
    #[default]
    PerField,
    /// One free variable per tuple, constrained by the concatenation of the
    /// field languages.
    ///
    /// Known limitation: field boundaries are lost, so `("a2", "cpsjstubbs")`
    /// and `("a2cps", "jstubbs")` denote the same requests.
    Concatenated,
}

/// Free variables for a policy type, created once and shared by every policy
/// compiled against it.
#[derive(Clone, Debug)]
pub struct SymEnv {
    policy_type: Arc<PolicyType>,
    encoding: TupleEncoding,
    vars: BTreeMap<SmolStr, TermVar>,
}

impl SymEnv {
    /// Create the environment for `policy_type`
    pub fn new(policy_type: Arc<PolicyType>, encoding: TupleEncoding) -> Self {
        let mut vars = BTreeMap::new();
        for schema in policy_type.components() {
            let names = match (schema.kind(), encoding) {
                (ComponentKind::Tuple(_), TupleEncoding::Concatenated) => {
                    vec![schema.name().clone()]
                }
                _ => schema.leaves().into_iter().map(|(name, _)| name).collect(),
            };
            for id in names {
                vars.insert(
                    id.clone(),
                    TermVar {
                        id,
                        ty: TermType::String,
                    },
                );
            }
        }
        Self {
            policy_type,
            encoding,
            vars,
        }
    }

    /// The policy type
    pub fn policy_type(&self) -> &Arc<PolicyType> {
        &self.policy_type
    }

    /// The tuple encoding
    pub fn encoding(&self) -> TupleEncoding {
        self.encoding
    }

    /// The free variable named `name`
    pub fn var(&self, name: &str) -> Option<Term> {
        self.vars.get(name).cloned().map(Term::Var)
    }

    /// All free variables, ordered by name
    pub fn vars(&self) -> impl Iterator<Item = &TermVar> {
        self.vars.values()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cloudsec_core::test_utils::http_api_type;

    #[test]
    fn per_field_vars() {
        let env = SymEnv::new(Arc::new(http_api_type()), TupleEncoding::PerField);
        let names: Vec<_> = env.vars().map(|v| v.id.as_str()).collect();
        assert_eq!(
            names,
            [
                "action",
                "principal_tenant",
                "principal_username",
                "resource_path",
                "resource_service",
                "resource_tenant"
            ]
        );
        assert!(env.var("principal").is_none());
    }

    #[test]
    fn concatenated_vars() {
        let env = SymEnv::new(Arc::new(http_api_type()), TupleEncoding::Concatenated);
        let names: Vec<_> = env.vars().map(|v| v.id.as_str()).collect();
        assert_eq!(names, ["action", "principal", "resource"]);
    }
}
