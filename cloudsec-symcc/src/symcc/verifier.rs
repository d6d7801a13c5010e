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

//! This module contains `verify*()` functions that generate a list of
//! `Asserts`: boolean terms whose conjunction is unsatisfiable if and only if
//! the verified property holds.

use std::sync::Arc;

use cloudsec_core::Policy;

use crate::symcc::authorizer::is_authorized;
use crate::symcc::compiler::CompileError;
use crate::symcc::env::SymEnv;
use crate::symcc::factory::{implies, not};
use crate::symcc::term::Term;

pub type Asserts = Arc<Vec<Term>>;

/// Returns asserts that are unsatisfiable iff `a` implies `b` under every
/// assignment of the free variables.
pub fn verify_terms_imply(a: &Term, b: &Term) -> Asserts {
    Arc::new(vec![not(implies(a.clone(), b.clone()))])
}

/// Returns asserts that are unsatisfiable iff every request allowed by
/// `policies1` is allowed by `policies2`.
pub fn verify_implies(
    policies1: &[Policy],
    policies2: &[Policy],
    env: &SymEnv,
) -> Result<Asserts, CompileError> {
    let term1 = is_authorized(policies1, env)?;
    let term2 = is_authorized(policies2, env)?;
    Ok(verify_terms_imply(&term1, &term2))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::symcc::env::TupleEncoding;
    use cloudsec_core::test_utils::{http_api_type, policy};

    #[test]
    fn trivial_implications() {
        let ty = Arc::new(http_api_type());
        let env = SymEnv::new(ty.clone(), TupleEncoding::PerField);
        let p = [policy(&ty, ("a2", "*"), ("a2", "apps", "*"), "GET", "allow")];
        // nothing allowed implies anything
        assert_eq!(*verify_implies(&[], &p, &env).unwrap(), [false.into()]);
        // anything implies itself
        assert_eq!(*verify_implies(&p, &p, &env).unwrap(), [false.into()]);
    }
}
