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

//! Policy types and helpers shared by the test suites of this workspace.

// PANIC SAFETY: testing code
#![allow(clippy::panic, clippy::unwrap_used)]

use std::sync::Arc;

use crate::{
    ComponentSchema, MatchingStrategy, Policy, PolicyType, Value, ALPHANUM_SET, PATH_CHAR_SET,
};

/// Tenant enum: `a2`, `a2cps`, `cyverse`, `vdj`, exact matching
pub fn tenant() -> ComponentSchema {
    ComponentSchema::string_enum(
        "tenant",
        ["a2", "a2cps", "cyverse", "vdj"],
        MatchingStrategy::exact(),
    )
    .unwrap()
}

/// Username string over [`ALPHANUM_SET`], at most 25 characters
pub fn username() -> ComponentSchema {
    ComponentSchema::string(
        "username",
        ALPHANUM_SET.iter().copied(),
        25,
        MatchingStrategy::one_wildcard(),
    )
    .unwrap()
}

/// `(tenant, username)`
pub fn principal() -> ComponentSchema {
    ComponentSchema::tuple("principal", [tenant(), username()]).unwrap()
}

/// Service enum: `systems`, `files`, `apps`, `jobs`
pub fn service() -> ComponentSchema {
    ComponentSchema::string_enum(
        "service",
        ["systems", "files", "apps", "jobs"],
        MatchingStrategy::exact(),
    )
    .unwrap()
}

/// Path string over [`PATH_CHAR_SET`], at most 250 characters
pub fn path() -> ComponentSchema {
    ComponentSchema::string(
        "path",
        PATH_CHAR_SET.iter().copied(),
        250,
        MatchingStrategy::one_wildcard(),
    )
    .unwrap()
}

/// `(tenant, service, path)`
pub fn resource() -> ComponentSchema {
    ComponentSchema::tuple("resource", [tenant(), service(), path()]).unwrap()
}

/// HTTP verbs
pub fn action() -> ComponentSchema {
    ComponentSchema::string_enum(
        "action",
        ["GET", "POST", "PUT", "DELETE"],
        MatchingStrategy::one_wildcard(),
    )
    .unwrap()
}

/// Permission levels
pub fn level() -> ComponentSchema {
    ComponentSchema::string_enum(
        "level",
        ["read", "execute", "write"],
        MatchingStrategy::one_wildcard(),
    )
    .unwrap()
}

/// `principal`, `resource`, `action`
pub fn http_api_type() -> PolicyType {
    PolicyType::new("http_api", [principal(), resource(), action()]).unwrap()
}

/// `principal`, `resource`, `level`
pub fn tapis_type() -> PolicyType {
    PolicyType::new("tapis", [principal(), resource(), level()]).unwrap()
}

/// Build a policy of a type whose components are `principal`, `resource`
/// and one more enum (named `last`), panicking on invalid input.
pub fn policy(
    policy_type: &Arc<PolicyType>,
    principal: (&str, &str),
    resource: (&str, &str, &str),
    last: &str,
    decision: &str,
) -> Policy {
    let last_name = policy_type
        .components()
        .last()
        .map(|c| c.name().clone())
        .unwrap();
    Policy::new(
        policy_type.clone(),
        [
            ("principal".into(), Value::from(principal)),
            ("resource".into(), resource.into()),
            (last_name, last.into()),
            ("decision".into(), decision.into()),
        ],
    )
    .unwrap()
}

/// Assert that the `Display` of `err` starts with `expected`
#[track_caller]
pub fn expect_err_starts_with(err: &impl miette::Diagnostic, expected: &str) {
    let msg = err.to_string();
    assert!(
        msg.starts_with(expected),
        "unexpected error message\n  expected prefix: {expected}\n  actual: {msg}"
    );
}
