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

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The datum a policy supplies for one component.
///
/// String and enum components take a `String`; tuple components take a
/// `Tuple` with one value per field, in field order.
#[derive(Serialize, Deserialize, Hash, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Value {
    /// A string, possibly containing wildcards or placeholders
    String(SmolStr),
    /// One value per tuple field
    Tuple(Vec<Value>),
}

impl Value {
    /// Name of the kind of this value, for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Tuple(_) => "tuple",
        }
    }

    /// The string, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Tuple(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<SmolStr> for Value {
    fn from(s: SmolStr) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Tuple(items)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Self::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{}\"", s.escape_debug()),
            Self::Tuple(items) => write!(f, "({})", items.iter().join(", ")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conversions() {
        let v: Value = ("a2cps", "jstubbs").into();
        assert_eq!(
            v,
            Value::Tuple(vec![Value::String("a2cps".into()), Value::String("jstubbs".into())])
        );
        assert_eq!(v.to_string(), r#"("a2cps", "jstubbs")"#);
        assert_eq!(v.kind_name(), "tuple");
        assert_eq!(Value::from("x").as_str(), Some("x"));
    }

    #[test]
    fn serde_untagged() {
        let v: Value = serde_json::from_str(r#"["tapis", ["s2", "*"]]"#).unwrap();
        assert_eq!(v, ("tapis", ("s2", "*")).into());
    }
}
