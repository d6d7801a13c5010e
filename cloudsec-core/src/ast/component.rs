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

use std::collections::{BTreeSet, HashSet};

use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

use super::{MatchingStrategy, Value, ValuePattern};

/// Errors raised while building a [`ComponentSchema`] or a
/// [`super::PolicyType`]. No partially-built schema is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum SchemaError {
    /// Component names must be non-empty
    #[error("component names must be non-empty")]
    EmptyName,
    /// An enum component needs at least one value
    #[error("enum component `{component}` declares no values")]
    EmptyEnum {
        /// Offending component
        component: SmolStr,
    },
    /// Enum values must be unique
    #[error("enum component `{component}` declares the value `{value}` more than once")]
    DuplicateEnumValue {
        /// Offending component
        component: SmolStr,
        /// The repeated value
        value: SmolStr,
    },
    /// An enum value contains the wildcard of the component's matching strategy
    #[error("value `{value}` of enum component `{component}` contains the wildcard `{wildcard}`")]
    #[diagnostic(help("choose a wildcard character that does not occur in any enum value"))]
    WildcardInEnumValue {
        /// Offending component
        component: SmolStr,
        /// The offending value
        value: SmolStr,
        /// The wildcard character
        wildcard: char,
    },
    /// A string component needs a non-empty character set
    #[error("string component `{component}` has an empty character set")]
    EmptyCharSet {
        /// Offending component
        component: SmolStr,
    },
    /// The wildcard is also a member of the character set
    #[error("the wildcard `{wildcard}` of string component `{component}` is a member of its character set")]
    #[diagnostic(help("a wildcard inside the character set cannot be told apart from a literal"))]
    WildcardInCharSet {
        /// Offending component
        component: SmolStr,
        /// The wildcard character
        wildcard: char,
    },
    /// A tuple component needs at least one field
    #[error("tuple component `{component}` declares no fields")]
    EmptyTuple {
        /// Offending component
        component: SmolStr,
    },
    /// Names must be unique within a policy type or a tuple
    #[error("component name `{name}` is declared more than once in `{scope}`")]
    DuplicateComponent {
        /// The repeated name
        name: SmolStr,
        /// The policy type or tuple in which it is repeated
        scope: SmolStr,
    },
    /// `decision` is implicitly part of every policy type
    #[error("component name `decision` is reserved")]
    #[diagnostic(help("every policy type implicitly has a `decision` component with values `allow` and `deny`"))]
    ReservedName,
}

/// Errors raised when a concrete value does not fit a component schema.
///
/// `component` is the dotted path of the component, e.g. `principal.username`.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum ValueError {
    /// The value has the wrong shape
    #[error("invalid data type for component `{component}`: expected {expected}, got {found}")]
    TypeMismatch {
        /// Offending component
        component: SmolStr,
        /// Expected kind of data
        expected: &'static str,
        /// Kind of data supplied
        found: SmolStr,
    },
    /// A tuple value with the wrong number of fields
    #[error("incorrect number of tuple data fields for component `{component}`: expected {expected} values, got {found} values")]
    TupleArity {
        /// Offending component
        component: SmolStr,
        /// Number of declared fields
        expected: usize,
        /// Number of supplied values
        found: usize,
    },
    /// An enum value that is neither a member nor an admissible wildcard
    #[error("value `{value}` is not allowed for enum component `{component}`; allowed values are [{allowed}]")]
    NotInEnum {
        /// Offending component
        component: SmolStr,
        /// The supplied value
        value: SmolStr,
        /// The declared values, comma separated
        allowed: String,
    },
    /// The value uses the wildcard in a way the matching strategy forbids
    #[error("value `{value}` of component `{component}` uses a wildcard not permitted by {matching} matching")]
    WildcardNotAllowed {
        /// Offending component
        component: SmolStr,
        /// The supplied value
        value: SmolStr,
        /// The component's matching strategy
        matching: MatchingStrategy,
    },
    /// A character outside the declared character set
    #[error("value `{value}` of component `{component}` contains `{ch}`, which is outside its character set")]
    CharOutsideSet {
        /// Offending component
        component: SmolStr,
        /// The supplied value
        value: SmolStr,
        /// The first offending character
        ch: char,
    },
    /// A string longer than `max_len`
    #[error("value `{value}` of component `{component}` has {len} characters, more than the maximum of {max_len}")]
    TooLong {
        /// Offending component
        component: SmolStr,
        /// The supplied value
        value: SmolStr,
        /// Number of literal characters
        len: usize,
        /// The declared maximum
        max_len: usize,
    },
}

/// A component whose values are drawn from a fixed list of strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumComponent {
    values: Vec<SmolStr>,
    matching: MatchingStrategy,
}

impl EnumComponent {
    /// The declared values, in declaration order
    pub fn values(&self) -> &[SmolStr] {
        &self.values
    }

    /// Matching strategy
    pub fn matching(&self) -> MatchingStrategy {
        self.matching
    }

    /// Is `value` one of the declared values?
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// The declared values denoted by the policy value `value`: every value
    /// for the wildcard token, the members matching an embedded-wildcard
    /// pattern, or the value itself.
    pub fn expand<'a>(&'a self, value: &str) -> Vec<&'a SmolStr> {
        if self.matching.is_wildcard_token(value) {
            return self.values.iter().collect();
        }
        if self.matching.allows_embedded_wildcard() {
            let pattern = ValuePattern::parse(value, self.matching.wildcard_char());
            if pattern.has_wildcard() {
                return self
                    .values
                    .iter()
                    .filter(|v| pattern.wildcard_match(v))
                    .collect();
            }
        }
        self.values.iter().filter(|v| *v == value).collect()
    }
}

/// A component whose values are strings over a character set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringComponent {
    char_set: BTreeSet<char>,
    max_len: usize,
    matching: MatchingStrategy,
}

impl StringComponent {
    /// The character set
    pub fn char_set(&self) -> &BTreeSet<char> {
        &self.char_set
    }

    /// Maximum number of literal characters in a value
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Matching strategy
    pub fn matching(&self) -> MatchingStrategy {
        self.matching
    }

    /// Parse a policy value of this component, recognising the wildcard and
    /// template placeholders
    pub fn parse_value(&self, value: &str) -> ValuePattern {
        ValuePattern::parse_template(value, self.matching.wildcard_char())
    }
}

/// A component composed of an ordered list of other components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleComponent {
    fields: Vec<ComponentSchema>,
}

impl TupleComponent {
    /// The fields, in order
    pub fn fields(&self) -> &[ComponentSchema] {
        &self.fields
    }
}

/// The kind of a component, with its kind-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// Enumeration of strings
    Enum(EnumComponent),
    /// String over a character set
    String(StringComponent),
    /// Tuple of components
    Tuple(TupleComponent),
}

/// A typed, named slot in a policy type
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "ComponentSchemaRepr", into = "ComponentSchemaRepr")]
pub struct ComponentSchema {
    name: SmolStr,
    kind: ComponentKind,
}

fn check_name(name: &SmolStr) -> Result<(), SchemaError> {
    if name.is_empty() {
        Err(SchemaError::EmptyName)
    } else if name == super::DECISION {
        Err(SchemaError::ReservedName)
    } else {
        Ok(())
    }
}

/// Checks that `names` has no repeats
pub(crate) fn check_unique<'a>(
    names: impl IntoIterator<Item = &'a SmolStr>,
    scope: &SmolStr,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateComponent {
                name: name.clone(),
                scope: scope.clone(),
            });
        }
    }
    Ok(())
}

impl ComponentSchema {
    /// A component with a fixed set of string values
    pub fn string_enum(
        name: impl Into<SmolStr>,
        values: impl IntoIterator<Item = impl Into<SmolStr>>,
        matching: MatchingStrategy,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        check_name(&name)?;
        let values: Vec<SmolStr> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(SchemaError::EmptyEnum { component: name });
        }
        if let Some(value) = values.iter().duplicates().next() {
            return Err(SchemaError::DuplicateEnumValue {
                component: name,
                value: value.clone(),
            });
        }
        if let Some(wildcard) = matching.wildcard_char() {
            if let Some(value) = values.iter().find(|v| v.contains(wildcard)) {
                return Err(SchemaError::WildcardInEnumValue {
                    component: name,
                    value: value.clone(),
                    wildcard,
                });
            }
        }
        Ok(Self {
            name,
            kind: ComponentKind::Enum(EnumComponent { values, matching }),
        })
    }

    /// A component with string values over `char_set` with at most `max_len`
    /// literal characters
    pub fn string(
        name: impl Into<SmolStr>,
        char_set: impl IntoIterator<Item = char>,
        max_len: usize,
        matching: MatchingStrategy,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        check_name(&name)?;
        let char_set: BTreeSet<char> = char_set.into_iter().collect();
        if char_set.is_empty() {
            return Err(SchemaError::EmptyCharSet { component: name });
        }
        if let Some(wildcard) = matching.wildcard_char() {
            if char_set.contains(&wildcard) {
                return Err(SchemaError::WildcardInCharSet {
                    component: name,
                    wildcard,
                });
            }
        }
        Ok(Self {
            name,
            kind: ComponentKind::String(StringComponent {
                char_set,
                max_len,
                matching,
            }),
        })
    }

    /// A component composed of the ordered `fields`
    pub fn tuple(
        name: impl Into<SmolStr>,
        fields: impl IntoIterator<Item = ComponentSchema>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        check_name(&name)?;
        let fields: Vec<ComponentSchema> = fields.into_iter().collect();
        if fields.is_empty() {
            return Err(SchemaError::EmptyTuple { component: name });
        }
        check_unique(fields.iter().map(|f| &f.name), &name)?;
        Ok(Self {
            name,
            kind: ComponentKind::Tuple(TupleComponent { fields }),
        })
    }

    /// The `decision` component every policy type carries
    pub(crate) fn decision() -> Self {
        Self {
            name: super::DECISION.into(),
            kind: ComponentKind::Enum(EnumComponent {
                values: vec!["allow".into(), "deny".into()],
                matching: MatchingStrategy::Exact,
            }),
        }
    }

    /// The component's name
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    /// The component's kind
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// The matching strategy, or `None` for tuples (whose fields carry their own)
    pub fn matching(&self) -> Option<MatchingStrategy> {
        match &self.kind {
            ComponentKind::Enum(e) => Some(e.matching),
            ComponentKind::String(s) => Some(s.matching),
            ComponentKind::Tuple(_) => None,
        }
    }

    /// Leaf components paired with the name of their free variable: the
    /// component's own name for enums and strings, `{tuple}_{field}` for
    /// tuple fields (applied recursively for nested tuples).
    pub fn leaves(&self) -> Vec<(SmolStr, &ComponentSchema)> {
        let mut out = Vec::new();
        self.collect_leaves(None, &mut out);
        out
    }

    fn collect_leaves<'a>(
        &'a self,
        prefix: Option<&str>,
        out: &mut Vec<(SmolStr, &'a ComponentSchema)>,
    ) {
        let var = match prefix {
            Some(p) => SmolStr::from(format!("{p}_{}", self.name)),
            None => self.name.clone(),
        };
        match &self.kind {
            ComponentKind::Tuple(t) => {
                for field in &t.fields {
                    field.collect_leaves(Some(&var), out);
                }
            }
            _ => out.push((var, self)),
        }
    }

    /// Checks that `value` fits this component. `path` is used in errors.
    pub fn validate(&self, path: &str, value: &Value) -> Result<(), ValueError> {
        match &self.kind {
            ComponentKind::Enum(e) => {
                let v = expect_string(path, value)?;
                validate_enum(e, path, v)
            }
            ComponentKind::String(s) => {
                let v = expect_string(path, value)?;
                validate_string(s, path, v)
            }
            ComponentKind::Tuple(t) => {
                let items = match value {
                    Value::Tuple(items) => items,
                    other => {
                        return Err(ValueError::TypeMismatch {
                            component: path.into(),
                            expected: "tuple",
                            found: other.kind_name().into(),
                        })
                    }
                };
                if items.len() != t.fields.len() {
                    return Err(ValueError::TupleArity {
                        component: path.into(),
                        expected: t.fields.len(),
                        found: items.len(),
                    });
                }
                for (field, item) in t.fields.iter().zip(items) {
                    field.validate(&format!("{path}.{}", field.name), item)?;
                }
                Ok(())
            }
        }
    }
}

fn expect_string<'a>(path: &str, value: &'a Value) -> Result<&'a SmolStr, ValueError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ValueError::TypeMismatch {
            component: path.into(),
            expected: "string",
            found: other.kind_name().into(),
        }),
    }
}

fn validate_enum(e: &EnumComponent, path: &str, value: &SmolStr) -> Result<(), ValueError> {
    if e.contains(value) || e.matching.is_wildcard_token(value) {
        return Ok(());
    }
    let has_wildcard = e.matching.wildcard_char().is_some_and(|w| value.contains(w));
    if has_wildcard && !e.matching.allows_embedded_wildcard() {
        return Err(ValueError::WildcardNotAllowed {
            component: path.into(),
            value: value.clone(),
            matching: e.matching,
        });
    }
    if has_wildcard && !e.expand(value).is_empty() {
        return Ok(());
    }
    Err(ValueError::NotInEnum {
        component: path.into(),
        value: value.clone(),
        allowed: e.values.iter().join(", "),
    })
}

fn validate_string(s: &StringComponent, path: &str, value: &SmolStr) -> Result<(), ValueError> {
    let pattern = s.parse_value(value);
    if pattern.has_wildcard()
        && !s.matching.is_wildcard_token(value)
        && !s.matching.allows_embedded_wildcard()
    {
        return Err(ValueError::WildcardNotAllowed {
            component: path.into(),
            value: value.clone(),
            matching: s.matching,
        });
    }
    if let Some(ch) = pattern.literal_chars().find(|c| !s.char_set.contains(c)) {
        return Err(ValueError::CharOutsideSet {
            component: path.into(),
            value: value.clone(),
            ch,
        });
    }
    let len = pattern.literal_chars().count();
    if len > s.max_len {
        return Err(ValueError::TooLong {
            component: path.into(),
            value: value.clone(),
            len,
            max_len: s.max_len,
        });
    }
    Ok(())
}

/// Serialized form of a [`ComponentSchema`]; deserialization goes through the
/// checked constructors.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ComponentSchemaRepr {
    Enum {
        name: SmolStr,
        values: Vec<SmolStr>,
        matching: MatchingStrategy,
    },
    #[serde(rename_all = "camelCase")]
    String {
        name: SmolStr,
        char_set: String,
        max_len: usize,
        matching: MatchingStrategy,
    },
    Tuple {
        name: SmolStr,
        fields: Vec<ComponentSchema>,
    },
}

impl TryFrom<ComponentSchemaRepr> for ComponentSchema {
    type Error = SchemaError;

    fn try_from(repr: ComponentSchemaRepr) -> Result<Self, Self::Error> {
        match repr {
            ComponentSchemaRepr::Enum {
                name,
                values,
                matching,
            } => Self::string_enum(name, values, matching),
            ComponentSchemaRepr::String {
                name,
                char_set,
                max_len,
                matching,
            } => Self::string(name, char_set.chars(), max_len, matching),
            ComponentSchemaRepr::Tuple { name, fields } => Self::tuple(name, fields),
        }
    }
}

impl From<ComponentSchema> for ComponentSchemaRepr {
    fn from(schema: ComponentSchema) -> Self {
        match schema.kind {
            ComponentKind::Enum(e) => Self::Enum {
                name: schema.name,
                values: e.values,
                matching: e.matching,
            },
            ComponentKind::String(s) => Self::String {
                name: schema.name,
                char_set: s.char_set.into_iter().collect(),
                max_len: s.max_len,
                matching: s.matching,
            },
            ComponentKind::Tuple(t) => Self::Tuple {
                name: schema.name,
                fields: t.fields,
            },
        }
    }
}
