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

//! This module compiles policy values into regular-language terms and
//! policies into boolean terms over the free variables of a [`SymEnv`].
//!
//! A component value `v` becomes a language `L(v)` such that a request value
//! `r` matches `v` iff `r ∈ L(v)`:
//! * enum values denote the union of the members they cover (all members for
//!   the wildcard token, the matching members for an embedded pattern);
//! * string values are the concatenation of their segments, where a literal
//!   run is a singleton language, a wildcard is `(re.* (re.union c1 .. cn))`
//!   over the component's character set, and a `{{ name }}` placeholder is the
//!   singleton language of the free variable `name`;
//! * tuple values are compiled field by field, either against one variable per
//!   field or, in the concatenated encoding, as one concatenated language.

use std::sync::Arc;

use cloudsec_core::{
    ComponentKind, ComponentSchema, PatternSegment, Policy, StringComponent, Value, ValueError,
};
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;
use tracing::debug;

use super::env::{SymEnv, TupleEncoding};
use super::factory::{all_true, re_concat, re_star, re_union, str_in_re, str_to_re};
use super::term::Term;

/// Errors raised while compiling policies into terms.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
pub enum CompileError {
    /// The value does not fit its component
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidValue(#[from] ValueError),
    /// A `{{ name }}` placeholder that does not name a free variable
    #[error("placeholder `{{{{ {name} }}}}` in component `{component}` does not name a free variable")]
    #[diagnostic(help(
        "placeholders refer to leaf components, e.g. `principal_username` for the `username` field of `principal`"
    ))]
    UnknownPlaceholder {
        /// Component containing the placeholder
        component: SmolStr,
        /// The placeholder's name
        name: SmolStr,
    },
    /// No free variable exists for a component
    #[error("no free variable named `{0}`")]
    UnboundVariable(SmolStr),
    /// A policy compiled against a different policy type
    #[error("policy of type `{found}` cannot be compiled against policy type `{expected}`")]
    PolicyTypeMismatch {
        /// The environment's policy type
        expected: SmolStr,
        /// The policy's type
        found: SmolStr,
    },
}

type Result<T> = std::result::Result<T, CompileError>;

/// The language matching any string over the component's character set
fn match_all(s: &StringComponent) -> Term {
    re_star(re_union(
        s.char_set()
            .iter()
            .map(|c| str_to_re(SmolStr::from(c.to_string()).into())),
    ))
}

fn compile_string(s: &StringComponent, path: &str, value: &str, env: &SymEnv) -> Result<Term> {
    let parts = s
        .parse_value(value)
        .iter()
        .map(|seg| match seg {
            PatternSegment::Literal(lit) => Ok(str_to_re(lit.clone().into())),
            PatternSegment::Wildcard => Ok(match_all(s)),
            PatternSegment::Placeholder(name) => {
                env.var(name)
                    .map(str_to_re)
                    .ok_or_else(|| CompileError::UnknownPlaceholder {
                        component: path.into(),
                        name: name.clone(),
                    })
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(re_concat(parts))
}

fn compile_regex(schema: &ComponentSchema, path: &str, value: &Value, env: &SymEnv) -> Result<Term> {
    match (schema.kind(), value) {
        (ComponentKind::Enum(e), Value::String(v)) => Ok(re_union(
            e.expand(v)
                .into_iter()
                .map(|member| str_to_re(member.clone().into())),
        )),
        (ComponentKind::String(s), Value::String(v)) => compile_string(s, path, v, env),
        (ComponentKind::Tuple(t), Value::Tuple(items)) => {
            let parts = t
                .fields()
                .iter()
                .zip(items)
                .map(|(field, item)| {
                    compile_regex(field, &format!("{path}.{}", field.name()), item, env)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(re_concat(parts))
        }
        (ComponentKind::Tuple(_), other) => Err(ValueError::TypeMismatch {
            component: path.into(),
            expected: "tuple",
            found: other.kind_name().into(),
        }
        .into()),
        (_, other) => Err(ValueError::TypeMismatch {
            component: path.into(),
            expected: "string",
            found: other.kind_name().into(),
        }
        .into()),
    }
}

/// Compile `value` into the regular language of the request values it
/// matches. `path` names the component in errors.
pub fn compile_value(
    schema: &ComponentSchema,
    path: &str,
    value: &Value,
    env: &SymEnv,
) -> Result<Term> {
    schema.validate(path, value)?;
    compile_regex(schema, path, value, env)
}

fn push_constraints(
    schema: &ComponentSchema,
    path: &str,
    var_name: &str,
    value: &Value,
    env: &SymEnv,
    out: &mut Vec<Term>,
) -> Result<()> {
    match (schema.kind(), value, env.encoding()) {
        (ComponentKind::Tuple(t), Value::Tuple(items), TupleEncoding::PerField) => {
            for (field, item) in t.fields().iter().zip(items) {
                push_constraints(
                    field,
                    &format!("{path}.{}", field.name()),
                    &format!("{var_name}_{}", field.name()),
                    item,
                    env,
                    out,
                )?;
            }
            Ok(())
        }
        _ => {
            let var = env
                .var(var_name)
                .ok_or_else(|| CompileError::UnboundVariable(var_name.into()))?;
            out.push(str_in_re(var, compile_regex(schema, path, value, env)?));
            Ok(())
        }
    }
}

/// Compile one component of a policy into membership constraints on the
/// component's free variables, one per variable.
pub fn compile_component(
    schema: &ComponentSchema,
    value: &Value,
    env: &SymEnv,
) -> Result<Vec<Term>> {
    schema.validate(schema.name(), value)?;
    let mut out = Vec::new();
    push_constraints(schema, schema.name(), schema.name(), value, env, &mut out)?;
    Ok(out)
}

/// Compile a policy into the conjunction of its component constraints. The
/// decision is not part of the result.
pub fn compile_policy(policy: &Policy, env: &SymEnv) -> Result<Term> {
    let expected = env.policy_type();
    if !Arc::ptr_eq(policy.policy_type(), expected) && policy.policy_type() != expected {
        return Err(CompileError::PolicyTypeMismatch {
            expected: expected.name().clone(),
            found: policy.policy_type().name().clone(),
        });
    }
    let mut constraints = Vec::new();
    for (schema, value) in policy.iter() {
        constraints.extend(compile_component(schema, value, env)?);
    }
    debug!(
        policy = %policy,
        constraints = constraints.len(),
        "compiled policy"
    );
    Ok(all_true(constraints))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symcc::factory::{re_none, str_to_re};
    use crate::symcc::op::Op;
    use cloudsec_core::test_utils::{action, http_api_type, path, policy, principal};
    use cloudsec_core::{MatchingStrategy, PolicyType};
    use cool_asserts::assert_matches;

    fn env() -> SymEnv {
        SymEnv::new(Arc::new(http_api_type()), TupleEncoding::PerField)
    }

    fn lit(s: &str) -> Term {
        str_to_re(s.into())
    }

    #[test]
    fn enum_literal() {
        let env = env();
        assert_eq!(
            compile_value(&action(), "action", &"GET".into(), &env).unwrap(),
            lit("GET")
        );
    }

    #[test]
    fn enum_wildcard() {
        let env = env();
        assert_eq!(
            compile_value(&action(), "action", &"*".into(), &env).unwrap(),
            re_union([lit("GET"), lit("POST"), lit("PUT"), lit("DELETE")])
        );
        assert_eq!(
            compile_value(&action(), "action", &"P*".into(), &env).unwrap(),
            re_union([lit("POST"), lit("PUT")])
        );
    }

    #[test]
    fn enum_errors() {
        let env = env();
        assert_matches!(
            compile_value(&action(), "action", &"PATCH".into(), &env),
            Err(CompileError::InvalidValue(ValueError::NotInEnum { .. }))
        );
        let exact =
            ComponentSchema::string_enum("e", ["a", "b"], MatchingStrategy::exact()).unwrap();
        assert_matches!(
            compile_value(&exact, "e", &"*".into(), &env),
            Err(CompileError::InvalidValue(ValueError::NotInEnum { .. }))
        );
    }

    #[test]
    fn string_segments() {
        let env = env();
        let schema = path();
        let any = match schema.kind() {
            ComponentKind::String(s) => match_all(s),
            _ => re_none(),
        };
        assert_eq!(
            compile_value(&schema, "path", &"s2/home/*".into(), &env).unwrap(),
            re_concat([lit("s2/home/"), any.clone()])
        );
        assert_eq!(
            compile_value(&schema, "path", &"*".into(), &env).unwrap(),
            any
        );
        assert_eq!(
            compile_value(&schema, "path", &"".into(), &env).unwrap(),
            lit("")
        );
        assert_eq!(
            compile_value(&schema, "path", &"a.py".into(), &env).unwrap(),
            lit("a.py")
        );
        assert_eq!(
            compile_value(&schema, "path", &"*a*".into(), &env).unwrap(),
            re_concat([any.clone(), lit("a"), any])
        );
    }

    #[test]
    fn string_placeholders() {
        let env = env();
        let compiled = compile_value(
            &path(),
            "path",
            &"s2/home/{{ principal_username }}".into(),
            &env,
        )
        .unwrap();
        let user = env.var("principal_username").unwrap();
        assert_eq!(compiled, re_concat([lit("s2/home/"), str_to_re(user)]));

        assert_matches!(
            compile_value(&path(), "path", &"s2/{{ nobody }}".into(), &env),
            Err(CompileError::UnknownPlaceholder { name, .. }) => assert_eq!(name, "nobody")
        );
    }

    #[test]
    fn tuple_per_field() {
        let env = env();
        let constraints =
            compile_component(&principal(), &("a2cps", "jstubbs").into(), &env).unwrap();
        assert_eq!(
            constraints,
            [
                str_in_re(env.var("principal_tenant").unwrap(), lit("a2cps")),
                str_in_re(env.var("principal_username").unwrap(), lit("jstubbs")),
            ]
        );
    }

    #[test]
    fn tuple_concatenated() {
        let env = SymEnv::new(Arc::new(http_api_type()), TupleEncoding::Concatenated);
        let constraints =
            compile_component(&principal(), &("a2cps", "jstubbs").into(), &env).unwrap();
        assert_eq!(
            constraints,
            [str_in_re(
                env.var("principal").unwrap(),
                re_concat([lit("a2cps"), lit("jstubbs")])
            )]
        );
    }

    #[test]
    fn policy_conjunction() {
        let ty = Arc::new(http_api_type());
        let env = SymEnv::new(ty.clone(), TupleEncoding::PerField);
        let p = policy(
            &ty,
            ("a2cps", "jstubbs"),
            ("a2cps", "files", "s2/home/jstubbs/a.out"),
            "GET",
            "allow",
        );
        let t = compile_policy(&p, &env).unwrap();
        assert_eq!(t.free_vars().len(), 6);
        assert_matches!(t, Term::App { op: Op::And, .. });
    }

    #[test]
    fn policy_type_mismatch() {
        let ty = Arc::new(http_api_type());
        let other = Arc::new(PolicyType::new("other", [principal()]).unwrap());
        let env = SymEnv::new(other, TupleEncoding::PerField);
        let p = policy(
            &ty,
            ("a2cps", "jstubbs"),
            ("a2cps", "files", "s2"),
            "GET",
            "allow",
        );
        assert_matches!(
            compile_policy(&p, &env),
            Err(CompileError::PolicyTypeMismatch { .. })
        );
    }
}
