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

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use super::{ComponentKind, ComponentSchema, PolicyType, Value, ValueError, DECISION};

/// Whether a policy grants or revokes access
#[derive(Serialize, Deserialize, Hash, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Grants access
    Allow,
    /// Revokes access, overriding any grant
    Deny,
}

impl Decision {
    /// The wire name, `allow` or `deny`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Decision {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(PolicyError::InvalidDecision { found: s.into() }),
        }
    }
}

/// Errors raised while constructing a [`Policy`]. No partially-built policy
/// is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum PolicyError {
    /// A declared component has no data
    #[error("missing data for component `{component}` of policy type `{policy_type}`")]
    MissingComponent {
        /// The policy type
        policy_type: SmolStr,
        /// The component without data
        component: SmolStr,
    },
    /// Data was given for a name the policy type does not declare
    #[error("policy type `{policy_type}` has no component named `{component}`")]
    UnknownComponent {
        /// The policy type
        policy_type: SmolStr,
        /// The unknown name
        component: SmolStr,
    },
    /// Data was given twice for the same component
    #[error("data for component `{component}` was supplied more than once")]
    DuplicateComponent {
        /// The repeated component
        component: SmolStr,
    },
    /// No decision was supplied
    #[error("missing decision; every policy requires a `decision` of `allow` or `deny`")]
    MissingDecision,
    /// The decision is neither `allow` nor `deny`
    #[error("invalid decision `{found}`; expected `allow` or `deny`")]
    InvalidDecision {
        /// What was supplied
        found: SmolStr,
    },
    /// Policy JSON that is not an object
    #[error("policy data must be a JSON object, got {found}")]
    NotAnObject {
        /// Kind of JSON value supplied
        found: &'static str,
    },
    /// A component value does not fit its schema
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidValue(#[from] ValueError),
}

/// A concrete assignment of values to every component of a policy type,
/// plus a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    policy_type: Arc<PolicyType>,
    values: Vec<Value>,
    decision: Decision,
}

impl Policy {
    /// Build a policy from `(component name, value)` pairs. A pair named
    /// `decision` supplies the decision and must be present.
    pub fn new<N: Into<SmolStr>>(
        policy_type: Arc<PolicyType>,
        data: impl IntoIterator<Item = (N, Value)>,
    ) -> Result<Self, PolicyError> {
        let mut decision = None;
        let mut supplied: HashMap<SmolStr, Value> = HashMap::new();
        for (name, value) in data {
            let name = name.into();
            if name == DECISION {
                let found = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string().into(),
                };
                if decision.replace(found.parse()?).is_some() {
                    return Err(PolicyError::DuplicateComponent { component: name });
                }
                continue;
            }
            if policy_type.position(&name).is_none() {
                return Err(PolicyError::UnknownComponent {
                    policy_type: policy_type.name().clone(),
                    component: name,
                });
            }
            if supplied.contains_key(&name) {
                return Err(PolicyError::DuplicateComponent { component: name });
            }
            supplied.insert(name, value);
        }
        let decision = decision.ok_or(PolicyError::MissingDecision)?;

        let mut values = Vec::with_capacity(policy_type.components().len());
        for schema in policy_type.components() {
            let value = supplied
                .remove(schema.name())
                .ok_or_else(|| PolicyError::MissingComponent {
                    policy_type: policy_type.name().clone(),
                    component: schema.name().clone(),
                })?;
            schema.validate(schema.name(), &value)?;
            values.push(value);
        }
        Ok(Self {
            policy_type,
            values,
            decision,
        })
    }

    /// Build a policy from a JSON object mapping component names to data.
    /// String and enum components take JSON strings; tuple components take
    /// arrays. Numbers, booleans, objects and `null` are rejected.
    pub fn from_json(
        policy_type: Arc<PolicyType>,
        json: serde_json::Value,
    ) -> Result<Self, PolicyError> {
        let map = match json {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(PolicyError::NotAnObject {
                    found: json_kind(&other),
                })
            }
        };
        let mut data = Vec::with_capacity(map.len());
        for (name, json) in map {
            let value = if name == DECISION {
                match json {
                    serde_json::Value::String(s) => Value::String(s.into()),
                    other => {
                        return Err(PolicyError::InvalidDecision {
                            found: other.to_string().into(),
                        })
                    }
                }
            } else {
                let schema = policy_type.component(&name).map_err(|e| {
                    PolicyError::UnknownComponent {
                        policy_type: e.policy_type,
                        component: e.component,
                    }
                })?;
                value_from_json(schema, &name, json)?
            };
            data.push((name, value));
        }
        Self::new(policy_type, data)
    }

    /// The policy type
    pub fn policy_type(&self) -> &Arc<PolicyType> {
        &self.policy_type
    }

    /// The decision
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Values aligned with [`PolicyType::components`]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Component schemas paired with this policy's values
    pub fn iter(&self) -> impl Iterator<Item = (&ComponentSchema, &Value)> {
        self.policy_type.components().iter().zip(&self.values)
    }

    /// The value of component `name`
    pub fn value(&self, name: &str) -> Result<&Value, super::LookupError> {
        self.policy_type
            .position(name)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| super::LookupError {
                policy_type: self.policy_type.name().clone(),
                component: name.into(),
            })
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.policy_type.name())?;
        for (schema, value) in self.iter() {
            write!(f, "{}: {value}, ", schema.name())?;
        }
        write!(f, "{DECISION}: {})", self.decision)
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "float",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "tuple",
        serde_json::Value::Object(_) => "object",
    }
}

fn value_from_json(
    schema: &ComponentSchema,
    path: &str,
    json: serde_json::Value,
) -> Result<Value, ValueError> {
    match (schema.kind(), json) {
        (ComponentKind::Tuple(t), serde_json::Value::Array(items))
            if items.len() == t.fields().len() =>
        {
            t.fields()
                .iter()
                .zip(items)
                .map(|(field, item)| {
                    value_from_json(field, &format!("{path}.{}", field.name()), item)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple)
        }
        (ComponentKind::Tuple(t), serde_json::Value::Array(items)) => {
            Err(ValueError::TupleArity {
                component: path.into(),
                expected: t.fields().len(),
                found: items.len(),
            })
        }
        (ComponentKind::Tuple(_), other) => Err(ValueError::TypeMismatch {
            component: path.into(),
            expected: "tuple",
            found: json_kind(&other).into(),
        }),
        (_, serde_json::Value::String(s)) => Ok(Value::String(s.into())),
        (_, other) => Err(ValueError::TypeMismatch {
            component: path.into(),
            expected: "string",
            found: json_kind(&other).into(),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{expect_err_starts_with, http_api_type};
    use cool_asserts::assert_matches;
    use serde_json::json;

    #[test]
    fn construct() {
        let ty = Arc::new(http_api_type());
        let p = Policy::new(
            ty.clone(),
            [
                ("principal", ("a2cps", "jstubbs").into()),
                ("resource", ("a2cps", "files", "s2/home/jstubbs/*").into()),
                ("action", "GET".into()),
                ("decision", "allow".into()),
            ],
        )
        .unwrap();
        assert_eq!(p.decision(), Decision::Allow);
        assert_eq!(p.value("action").unwrap(), &Value::from("GET"));
        assert_eq!(p.values().len(), 3);
        assert!(p.value("decision").is_err());
    }

    #[test]
    fn decisions() {
        assert_eq!("deny".parse::<Decision>().unwrap(), Decision::Deny);
        assert_matches!(
            "Allow".parse::<Decision>(),
            Err(PolicyError::InvalidDecision { .. })
        );
    }

    #[test]
    fn construction_errors() {
        let ty = Arc::new(http_api_type());
        let with_principal = |principal: Value| {
            vec![
                ("principal", principal),
                ("resource", ("a2cps", "files", "s2/home/jstubbs/*").into()),
                ("action", "GET".into()),
            ]
        };
        let base = || with_principal(("a2cps", "jstubbs").into());

        assert_matches!(
            Policy::new(ty.clone(), base()),
            Err(PolicyError::MissingDecision)
        );

        let mut data = base();
        data.push(("decision", "maybe".into()));
        assert_matches!(
            Policy::new(ty.clone(), data),
            Err(PolicyError::InvalidDecision { found }) => assert_eq!(found, "maybe")
        );

        let mut data = base();
        data.pop();
        data.push(("decision", "deny".into()));
        assert_matches!(
            Policy::new(ty.clone(), data),
            Err(PolicyError::MissingComponent { component, .. }) => assert_eq!(component, "action")
        );

        let mut data = base();
        data.push(("color", "red".into()));
        data.push(("decision", "deny".into()));
        assert_matches!(
            Policy::new(ty.clone(), data),
            Err(PolicyError::UnknownComponent { component, .. }) => assert_eq!(component, "color")
        );

        let mut data = with_principal(("a2cps", "jstubbs", "extra").into());
        data.push(("decision", "deny".into()));
        assert_matches!(
            Policy::new(ty.clone(), data),
            Err(PolicyError::InvalidValue(ValueError::TupleArity { expected: 2, found: 3, .. }))
        );

        let mut data = with_principal(("nasa", "jstubbs").into());
        data.push(("decision", "deny".into()));
        assert_matches!(
            Policy::new(ty, data),
            Err(PolicyError::InvalidValue(ValueError::NotInEnum { component, value, .. })) => {
                assert_eq!(component, "principal.tenant");
                assert_eq!(value, "nasa");
            }
        );
    }

    #[test]
    fn from_json() {
        let ty = Arc::new(http_api_type());
        let p = Policy::from_json(
            ty.clone(),
            json!({
                "principal": ["a2cps", "jstubbs"],
                "resource": ["a2cps", "files", "s2/home/{{ principal_username }}/*"],
                "action": "*",
                "decision": "deny",
            }),
        )
        .unwrap();
        assert_eq!(p.decision(), Decision::Deny);

        assert_matches!(
            Policy::from_json(
                ty.clone(),
                json!({
                    "principal": ["a2cps", "jstubbs"],
                    "resource": ["a2cps", "files", "s2"],
                    "action": 7,
                    "decision": "deny",
                })
            ),
            Err(PolicyError::InvalidValue(ValueError::TypeMismatch { expected: "string", found, .. })) => {
                assert_eq!(found, "integer");
            }
        );
        let err = Policy::from_json(
            ty.clone(),
            json!({
                "principal": ["a2cps", 7],
                "resource": ["a2cps", "files", "s2"],
                "action": "GET",
                "decision": "allow",
            }),
        )
        .unwrap_err();
        expect_err_starts_with(
            &err,
            "invalid data type for component `principal.username`: expected string, got integer",
        );
        assert_matches!(
            err,
            PolicyError::InvalidValue(ValueError::TypeMismatch { component, found, .. }) => {
                assert_eq!(component, "principal.username");
                assert_eq!(found, "integer");
            }
        );
        assert_matches!(
            Policy::from_json(ty.clone(), json!({ "decision": true })),
            Err(PolicyError::InvalidDecision { .. })
        );
        assert_matches!(
            Policy::from_json(ty, json!(["a"])),
            Err(PolicyError::NotAnObject { found: "tuple" })
        );
    }
}
