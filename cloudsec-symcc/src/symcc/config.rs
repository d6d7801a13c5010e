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

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env::TupleEncoding;

/// Configuration for a [`super::checker::PolicyEquivalenceChecker`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckerConfig {
    /// How long a query waits for the first conclusive backend when the
    /// caller gives no timeout.
    /// Defaults to 20 seconds.
    pub default_timeout: Duration,
    /// Per-query time limit passed to each solver process.
    /// `None` means the solver runs until cancelled.
    /// Defaults to `None`.
    pub solver_time_limit: Option<Duration>,
    /// How tuple components are bound to free variables.
    /// Defaults to [`TupleEncoding::PerField`].
    pub tuple_encoding: TupleEncoding,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(20),
            solver_time_limit: None,
            tuple_encoding: TupleEncoding::PerField,
        }
    }
}
