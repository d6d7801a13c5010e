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

//! Character sets commonly used by string components.

use std::collections::BTreeSet;

use lazy_static::lazy_static;

lazy_static! {
    /// Letters, digits and `-_.:`, for identifiers such as usernames
    pub static ref ALPHANUM_SET: BTreeSet<char> =
        "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-_.:"
            .chars()
            .collect();

    /// Letters, digits and `_/.:`, for file system paths
    pub static ref PATH_CHAR_SET: BTreeSet<char> =
        "abcdefghijklmnopqrstuvwxyz0123456789_/.:ABCDEFGHIJKLMNOPQRSTUVWXYZ"
            .chars()
            .collect();
}
