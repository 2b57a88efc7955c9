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

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common_catalog::TableType;

use crate::engine::TableEngine;
use crate::error::Result;

/// A table engine for tests that stores nothing.
pub struct MockTableEngine {
    name: String,
    unsupported: HashSet<TableType>,
    closed: AtomicBool,
}

impl MockTableEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unsupported: HashSet::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_unsupported(mut self, table_type: TableType) -> Self {
        let _ = self.unsupported.insert(table_type);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TableEngine for MockTableEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, table_type: TableType) -> bool {
        !self.unsupported.contains(&table_type)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
