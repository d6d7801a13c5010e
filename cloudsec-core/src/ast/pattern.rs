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

use smol_str::SmolStr;

/// Represent an element of a parsed component value
#[derive(Hash, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PatternSegment {
    /// A run of literal characters, never empty
    Literal(SmolStr),
    /// The wildcard; consecutive wildcards are collapsed into one
    Wildcard,
    /// A `{{ name }}` template placeholder referring to the free variable `name`
    Placeholder(SmolStr),
}

/// A component value split into literal runs, wildcards and placeholders.
///
/// An empty value parses to an empty segment list.
#[derive(Hash, Debug, Clone, PartialEq, Eq, Default)]
pub struct ValuePattern {
    segments: Vec<PatternSegment>,
    wildcard: Option<char>,
}

impl ValuePattern {
    /// Parse `value`, treating every occurrence of `wildcard` (if any) as a
    /// wildcard. Placeholders are not recognised.
    pub fn parse(value: &str, wildcard: Option<char>) -> Self {
        Self::parse_impl(value, wildcard, false)
    }

    /// Like [`Self::parse`], but also recognises `{{ name }}` placeholders.
    /// Whitespace around the name is ignored; a name containing whitespace,
    /// an empty name, or an unterminated `{{` is kept as literal text.
    pub fn parse_template(value: &str, wildcard: Option<char>) -> Self {
        Self::parse_impl(value, wildcard, true)
    }

    fn parse_impl(value: &str, wildcard: Option<char>, placeholders: bool) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = value;

        fn flush(literal: &mut String, segments: &mut Vec<PatternSegment>) {
            if !literal.is_empty() {
                segments.push(PatternSegment::Literal(SmolStr::new(&*literal)));
                literal.clear();
            }
        }

        loop {
            if placeholders {
                if let Some((name, tail)) = rest
                    .strip_prefix("{{")
                    .and_then(|after| after.split_once("}}"))
                {
                    let name = name.trim();
                    if !name.is_empty() && !name.contains(char::is_whitespace) {
                        flush(&mut literal, &mut segments);
                        segments.push(PatternSegment::Placeholder(name.into()));
                        rest = tail;
                        continue;
                    }
                }
            }
            let mut chars = rest.chars();
            let Some(c) = chars.next() else {
                break;
            };
            rest = chars.as_str();
            if Some(c) == wildcard {
                flush(&mut literal, &mut segments);
                if segments.last() != Some(&PatternSegment::Wildcard) {
                    segments.push(PatternSegment::Wildcard);
                }
            } else {
                literal.push(c);
            }
        }
        flush(&mut literal, &mut segments);
        Self { segments, wildcard }
    }

    /// The parsed segments, in order
    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// The character that was parsed as the wildcard
    pub fn wildcard(&self) -> Option<char> {
        self.wildcard
    }

    /// Iterate over the segments
    pub fn iter(&self) -> impl Iterator<Item = &PatternSegment> {
        self.segments.iter()
    }

    /// Does the value contain at least one wildcard?
    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&PatternSegment::Wildcard)
    }

    /// Does the value contain at least one placeholder?
    pub fn has_placeholder(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PatternSegment::Placeholder(_)))
    }

    /// Is the value exactly one wildcard?
    pub fn is_sole_wildcard(&self) -> bool {
        self.segments == [PatternSegment::Wildcard]
    }

    /// Names of the placeholders, in order of appearance (with repeats)
    pub fn placeholders(&self) -> impl Iterator<Item = &SmolStr> {
        self.segments.iter().filter_map(|s| match s {
            PatternSegment::Placeholder(name) => Some(name),
            _ => None,
        })
    }

    /// The literal characters of the value, i.e. the value with wildcards and
    /// placeholders removed
    pub fn literal_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PatternSegment::Literal(l) => Some(l.chars()),
                _ => None,
            })
            .flatten()
    }

    /// Find if `text` matches this pattern. Placeholders match any substring.
    pub fn wildcard_match(&self, text: &str) -> bool {
        let mut rest = text;
        // whether the next literal has to start exactly at `rest`
        let mut anchored = true;
        let count = self.segments.len();
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PatternSegment::Wildcard | PatternSegment::Placeholder(_) => anchored = false,
                PatternSegment::Literal(lit) => {
                    if anchored {
                        match rest.strip_prefix(lit.as_str()) {
                            Some(tail) => rest = tail,
                            None => return false,
                        }
                    } else if i + 1 == count {
                        return rest.ends_with(lit.as_str());
                    } else {
                        match rest.split_once(lit.as_str()) {
                            Some((_, tail)) => rest = tail,
                            None => return false,
                        }
                    }
                    anchored = true;
                }
            }
        }
        !anchored || rest.is_empty()
    }
}

impl std::fmt::Display for ValuePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for seg in &self.segments {
            match seg {
                PatternSegment::Literal(l) => write!(f, "{l}")?,
                PatternSegment::Wildcard => {
                    if let Some(w) = self.wildcard {
                        write!(f, "{w}")?
                    }
                }
                PatternSegment::Placeholder(name) => write!(f, "{{{{ {name} }}}}")?,
            }
        }
        Ok(())
    }
}
