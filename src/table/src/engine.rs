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

//! Storage engines a table definition can be bound to.

use std::sync::Arc;

use async_trait::async_trait;
use common_catalog::TableType;

use crate::error::Result;

pub mod manager;

/// A storage engine that serves tables of some definitions.
#[async_trait]
pub trait TableEngine: Send + Sync {
    /// Name of the engine, as recorded in table definitions.
    fn name(&self) -> &str;

    /// Whether the engine can store tables of `table_type`.
    fn supports(&self, _table_type: TableType) -> bool {
        true
    }

    /// Close the engine.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub type TableEngineRef = Arc<dyn TableEngine>;
