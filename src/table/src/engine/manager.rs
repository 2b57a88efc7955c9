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
use std::sync::Arc;

use async_trait::async_trait;
use common_catalog::TableType;
use common_telemetry::info;
use parking_lot::RwLock;
use snafu::{ensure, OptionExt};

use crate::engine::TableEngineRef;
use crate::error::{EngineNotFoundSnafu, EngineUnsupportedTableTypeSnafu, Result};

/// Resolves engine names recorded in table definitions.
#[async_trait]
pub trait TableEngineManager: Send + Sync {
    fn engine(&self, name: &str) -> Option<TableEngineRef>;

    fn register_engine(&self, engine: TableEngineRef);

    fn deregister_engine(&self, name: &str) -> Option<TableEngineRef>;

    fn engine_names(&self) -> Vec<String>;

    /// Returns the engine named `name` if it can serve tables of `table_type`.
    fn engine_for(&self, name: &str, table_type: TableType) -> Result<TableEngineRef> {
        let engine = self
            .engine(name)
            .context(EngineNotFoundSnafu { engine: name })?;
        ensure!(
            engine.supports(table_type),
            EngineUnsupportedTableTypeSnafu {
                engine: name,
                table_type,
            }
        );
        Ok(engine)
    }

    async fn close(&self) -> Result<()>;
}

pub type TableEngineManagerRef = Arc<dyn TableEngineManager>;

/// Simple in-memory table engine manager. Engine names are case-insensitive.
#[derive(Default)]
pub struct MemoryTableEngineManager {
    engines: RwLock<HashMap<String, TableEngineRef>>,
}

impl MemoryTableEngineManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engines(engines: impl IntoIterator<Item = TableEngineRef>) -> Self {
        let manager = Self::new();
        for engine in engines {
            manager.register_engine(engine);
        }
        manager
    }
}

#[async_trait]
impl TableEngineManager for MemoryTableEngineManager {
    fn engine(&self, name: &str) -> Option<TableEngineRef> {
        self.engines.read().get(&name.to_lowercase()).cloned()
    }

    fn register_engine(&self, engine: TableEngineRef) {
        let name = engine.name().to_lowercase();
        info!("Register table engine {}", name);
        let _ = self.engines.write().insert(name, engine);
    }

    fn deregister_engine(&self, name: &str) -> Option<TableEngineRef> {
        self.engines.write().remove(&name.to_lowercase())
    }

    fn engine_names(&self) -> Vec<String> {
        let mut names = self.engines.read().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    async fn close(&self) -> Result<()> {
        let engines = self.engines.read().values().cloned().collect::<Vec<_>>();

        futures::future::try_join_all(engines.iter().map(|engine| engine.close()))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_util::MockTableEngine;

    #[tokio::test]
    async fn test_table_engine_manager() {
        let memory = Arc::new(MockTableEngine::new("memory"));
        let memory_ref: TableEngineRef = memory.clone();
        let manager = MemoryTableEngineManager::with_engines([memory_ref]);
        manager.register_engine(Arc::new(
            MockTableEngine::new("InnoDB").with_unsupported(TableType::Temporary),
        ));

        assert_eq!(vec!["innodb", "memory"], manager.engine_names());
        assert_eq!("memory", manager.engine("MEMORY").unwrap().name());
        assert!(manager.engine("not_exists").is_none());

        let engine = manager.engine_for("innodb", TableType::Standard).unwrap();
        assert_eq!("InnoDB", engine.name());
        assert!(matches!(
            manager.engine_for("innodb", TableType::Temporary),
            Err(Error::EngineUnsupportedTableType { .. })
        ));
        assert!(matches!(
            manager.engine_for("csv", TableType::Standard),
            Err(Error::EngineNotFound { .. })
        ));

        assert!(manager.deregister_engine("InnoDB").is_some());
        assert!(manager.engine("innodb").is_none());

        manager.close().await.unwrap();
        assert!(memory.is_closed());
    }
}
