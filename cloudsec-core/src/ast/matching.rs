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

use serde::{Deserialize, Serialize};

/// The wildcard character used when none is given explicitly.
pub const DEFAULT_WILDCARD: char = '*';

fn default_wildcard() -> char {
    DEFAULT_WILDCARD
}

/// How two values of the same component compare.
///
/// The strategy only identifies which character (if any) is special; the
/// meaning of that character is given by the symbolic compiler.
#[derive(Serialize, Deserialize, Hash, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchingStrategy {
    /// No wildcards. Two values match only if they are identical.
    Exact,
    /// Exact matching extended with a single token that matches every value.
    /// The token cannot be combined with other characters.
    ///
    /// For an enum with values `["GET", "POST"]` the admissible policy values
    /// are `"GET"`, `"POST"` and `"*"`.
    StandaloneWildcard {
        /// The token matching every value
        #[serde(default = "default_wildcard")]
        wildcard: char,
    },
    /// The wildcard may appear anywhere inside a value, any number of times,
    /// and matches any (possibly empty) substring. `"P*"` matches both
    /// `"POST"` and `"PUT"`.
    OneWildcard {
        /// The character matching any substring
        #[serde(default = "default_wildcard")]
        wildcard: char,
    },
}

impl MatchingStrategy {
    /// Exact matching.
    pub fn exact() -> Self {
        Self::Exact
    }

    /// Standalone wildcard matching with the default `*` token.
    pub fn standalone_wildcard() -> Self {
        Self::StandaloneWildcard {
            wildcard: DEFAULT_WILDCARD,
        }
    }

    /// Embedded wildcard matching with the default `*` character.
    pub fn one_wildcard() -> Self {
        Self::OneWildcard {
            wildcard: DEFAULT_WILDCARD,
        }
    }

    /// The special wildcard character, if this strategy has one.
    pub fn wildcard_char(&self) -> Option<char> {
        match self {
            Self::Exact => None,
            Self::StandaloneWildcard { wildcard } | Self::OneWildcard { wildcard } => {
                Some(*wildcard)
            }
        }
    }

    /// Whether the wildcard may be combined with other characters in a value.
    pub fn allows_embedded_wildcard(&self) -> bool {
        matches!(self, Self::OneWildcard { .. })
    }

    /// Whether `value` is exactly the wildcard token of this strategy.
    pub fn is_wildcard_token(&self, value: &str) -> bool {
        let mut chars = value.chars();
        match (self.wildcard_char(), chars.next(), chars.next()) {
            (Some(w), Some(c), None) => w == c,
            _ => false,
        }
    }
}

impl std::fmt::Display for MatchingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::StandaloneWildcard { wildcard } => write!(f, "standalone wildcard `{wildcard}`"),
            Self::OneWildcard { wildcard } => write!(f, "one wildcard `{wildcard}`"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wildcard_chars() {
        assert_eq!(MatchingStrategy::exact().wildcard_char(), None);
        assert_eq!(
            MatchingStrategy::standalone_wildcard().wildcard_char(),
            Some('*')
        );
        assert_eq!(
            MatchingStrategy::OneWildcard { wildcard: '%' }.wildcard_char(),
            Some('%')
        );
    }

    #[test]
    fn wildcard_token() {
        let m = MatchingStrategy::standalone_wildcard();
        assert!(m.is_wildcard_token("*"));
        assert!(!m.is_wildcard_token("**"));
        assert!(!m.is_wildcard_token("a*"));
        assert!(!m.is_wildcard_token(""));
        assert!(!MatchingStrategy::exact().is_wildcard_token("*"));
    }

    #[test]
    fn serde_default_wildcard() {
        let m: MatchingStrategy = serde_json::from_str(r#"{"kind": "oneWildcard"}"#).unwrap();
        assert_eq!(m, MatchingStrategy::one_wildcard());
        let m: MatchingStrategy = serde_json::from_str(r#"{"kind": "exact"}"#).unwrap();
        assert_eq!(m, MatchingStrategy::Exact);
    }
}
