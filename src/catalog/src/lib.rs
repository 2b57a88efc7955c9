// Copyright 2023 Greptime Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
mod placeholder;
pub mod share;
pub mod singular;
mod unused;

use std::fmt::{self, Display};

pub use cache::{CachedTableEntry, EntryState, OpenOutcome, TableDefinitionCache, TableHandle};
pub use config::{PlaceholderPolicy, TableCacheConfig, TableCacheOptions};
pub use loader::{TableLoader, TableLoaderRef};
pub use placeholder::PlaceholderMode;
pub use share::TableShare;
pub use singular::SingularShare;

/// Identity of a client session or DDL statement acting on the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}
