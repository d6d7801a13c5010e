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

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use super::component::check_unique;
use super::{ComponentSchema, SchemaError};

/// Name of the component every policy type implicitly carries
pub const DECISION: &str = "decision";

/// Failure to find a component by name
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("policy type `{policy_type}` has no component named `{component}`")]
pub struct LookupError {
    /// The policy type searched
    pub policy_type: SmolStr,
    /// The name looked up
    pub component: SmolStr,
}

/// A named, ordered collection of components. Every policy belongs to
/// exactly one policy type, and only policies of the same type can be
/// compared.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(try_from = "PolicyTypeRepr", into = "PolicyTypeRepr")]
pub struct PolicyType {
    name: SmolStr,
    components: Vec<ComponentSchema>,
    index: HashMap<SmolStr, usize>,
    decision: ComponentSchema,
}

impl PolicyType {
    /// Build a policy type. Component names must be unique and must not be
    /// `decision`.
    pub fn new(
        name: impl Into<SmolStr>,
        components: impl IntoIterator<Item = ComponentSchema>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyName);
        }
        let components: Vec<ComponentSchema> = components.into_iter().collect();
        check_unique(components.iter().map(ComponentSchema::name), &name)?;
        let index = components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().clone(), i))
            .collect();
        Ok(Self {
            name,
            components,
            index,
            decision: ComponentSchema::decision(),
        })
    }

    /// The policy type's name
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// The declared components, in declaration order. `decision` is not
    /// included.
    pub fn components(&self) -> &[ComponentSchema] {
        &self.components
    }

    /// Position of the component `name` in [`Self::components`]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Look up a component by name. `decision` resolves to the implicit
    /// decision component.
    pub fn component(&self, name: &str) -> Result<&ComponentSchema, LookupError> {
        if name == DECISION {
            return Ok(&self.decision);
        }
        self.position(name)
            .and_then(|i| self.components.get(i))
            .ok_or_else(|| LookupError {
                policy_type: self.name.clone(),
                component: name.into(),
            })
    }

    /// The implicit `decision` component
    pub fn decision(&self) -> &ComponentSchema {
        &self.decision
    }
}

impl PartialEq for PolicyType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.components == other.components
    }
}

impl Eq for PolicyType {}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct PolicyTypeRepr {
    name: SmolStr,
    components: Vec<ComponentSchema>,
}

impl TryFrom<PolicyTypeRepr> for PolicyType {
    type Error = SchemaError;

    fn try_from(repr: PolicyTypeRepr) -> Result<Self, Self::Error> {
        Self::new(repr.name, repr.components)
    }
}

impl From<PolicyType> for PolicyTypeRepr {
    fn from(ty: PolicyType) -> Self {
        Self {
            name: ty.name,
            components: ty.components,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ComponentKind, MatchingStrategy};
    use cool_asserts::assert_matches;

    fn enum_component(name: &str) -> ComponentSchema {
        ComponentSchema::string_enum(name, ["a", "b"], MatchingStrategy::exact()).unwrap()
    }

    #[test]
    fn lookup() {
        let ty = PolicyType::new("t", [enum_component("x"), enum_component("y")]).unwrap();
        assert_eq!(ty.component("y").unwrap().name(), "y");
        assert_eq!(ty.position("x"), Some(0));
        assert_matches!(ty.component("decision").unwrap().kind(), ComponentKind::Enum(e) => {
            assert_eq!(e.values(), ["allow", "deny"]);
        });
        assert_matches!(ty.component("z"), Err(LookupError { component, .. }) => {
            assert_eq!(component, "z");
        });
    }

    #[test]
    fn construction_errors() {
        assert_matches!(
            PolicyType::new("t", [enum_component("x"), enum_component("x")]),
            Err(SchemaError::DuplicateComponent { name, scope }) => {
                assert_eq!(name, "x");
                assert_eq!(scope, "t");
            }
        );
        assert_matches!(PolicyType::new("", []), Err(SchemaError::EmptyName));
    }

    #[test]
    fn serde_round_trip() {
        let ty = PolicyType::new("t", [enum_component("x")]).unwrap();
        let json = serde_json::to_string(&ty).unwrap();
        let back: PolicyType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
        assert_eq!(back.position("x"), Some(0));
    }
}
