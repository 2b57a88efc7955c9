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

use std::collections::HashMap;

use async_trait::async_trait;
use common_catalog::TableIdent;
use parking_lot::RwLock;
use snafu::OptionExt;
use table::metadata::TableDefinition;

use crate::error::{Result, TableNotFoundSnafu};
use crate::loader::TableLoader;

/// Keeps definitions in memory, keyed by canonical path.
#[derive(Debug, Default)]
pub struct MemoryTableLoader {
    tables: RwLock<HashMap<String, TableDefinition>>,
}

impl MemoryTableLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `definition` for `ident`, returning the replaced one.
    pub fn insert(&self, ident: &TableIdent, definition: TableDefinition) -> Option<TableDefinition> {
        self.tables
            .write()
            .insert(ident.canonical_path().to_string(), definition)
    }

    pub fn remove(&self, ident: &TableIdent) -> Option<TableDefinition> {
        self.tables.write().remove(ident.canonical_path())
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

#[async_trait]
impl TableLoader for MemoryTableLoader {
    async fn load(&self, ident: &TableIdent) -> Result<TableDefinition> {
        self.tables
            .read()
            .get(ident.canonical_path())
            .cloned()
            .with_context(|| TableNotFoundSnafu {
                table: ident.sql_path(),
            })
    }
}
