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

//! Sources of table definitions.

use std::sync::Arc;

use async_trait::async_trait;
use common_catalog::TableIdent;
use table::metadata::TableDefinition;

use crate::error::Result;

mod fs;
mod memory;

pub use fs::FsTableLoader;
pub use memory::MemoryTableLoader;

/// Builds the definition of a table from persistent storage.
///
/// The cache never calls `load` for one key twice at the same time, and
/// never while holding its lock.
#[async_trait]
pub trait TableLoader: Send + Sync {
    /// Returns `TableNotFound` if no definition exists for `ident`.
    async fn load(&self, ident: &TableIdent) -> Result<TableDefinition>;
}

pub type TableLoaderRef = Arc<dyn TableLoader>;
