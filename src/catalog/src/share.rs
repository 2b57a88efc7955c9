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

//! The cached metadata of one table.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use common_catalog::{TableIdent, TableType};
use common_telemetry::warn;
use parking_lot::Mutex;
use table::metadata::TableDefinitionRef;

/// Lookup structures computed from a definition on first use.
#[derive(Debug)]
pub struct DerivedFields {
    /// Lower-cased column name to column position.
    column_index: HashMap<String, usize>,
    primary_key_columns: HashSet<usize>,
}

impl DerivedFields {
    fn new(definition: &TableDefinitionRef) -> Self {
        let column_index = definition
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name.to_lowercase(), i))
            .collect();
        let primary_key_columns = definition
            .primary_key()
            .map(|key| key.parts.iter().copied().collect())
            .unwrap_or_default();
        Self {
            column_index,
            primary_key_columns,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(&name.to_lowercase()).copied()
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        self.column_index(name)
            .map(|i| self.primary_key_columns.contains(&i))
            .unwrap_or(false)
    }
}

/// One table's definition with the bookkeeping the cache needs.
///
/// The reference count is only moved across zero by the cache while it holds
/// its structural lock.
#[derive(Debug)]
pub struct TableShare {
    ident: TableIdent,
    definition: TableDefinitionRef,
    /// Cache version when the definition was loaded. Never changes.
    generation: u64,
    version: AtomicU64,
    ref_count: AtomicUsize,
    /// Removed from the name table while still referenced.
    detached: AtomicBool,
    derived: Mutex<Option<Arc<DerivedFields>>>,
}

impl TableShare {
    /// Creates a share referenced once.
    pub(crate) fn new(ident: TableIdent, definition: TableDefinitionRef, version: u64) -> Self {
        Self {
            ident,
            definition,
            generation: version,
            version: AtomicU64::new(version),
            ref_count: AtomicUsize::new(1),
            detached: AtomicBool::new(false),
            derived: Mutex::new(None),
        }
    }

    pub fn ident(&self) -> &TableIdent {
        &self.ident
    }

    pub fn definition(&self) -> &TableDefinitionRef {
        &self.definition
    }

    pub fn table_type(&self) -> TableType {
        self.definition.table_type
    }

    pub fn engine(&self) -> &str {
        &self.definition.engine
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ref_count(&self) -> usize {
        self.ref_count.load(Ordering::Acquire)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Returns the derived fields, computing them on first call.
    pub fn derived_fields(&self) -> Arc<DerivedFields> {
        let mut derived = self.derived.lock();
        derived
            .get_or_insert_with(|| Arc::new(DerivedFields::new(&self.definition)))
            .clone()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.derived_fields().column_index(name)
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        self.derived_fields().is_primary_key_column(name)
    }

    pub(crate) fn set_version(&self, version: u64) {
        self.version.store(version, Ordering::Release);
    }

    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// Adds a reference, returning the previous count.
    pub(crate) fn retain(&self) -> usize {
        self.ref_count.fetch_add(1, Ordering::AcqRel)
    }

    /// Drops a reference if others remain. Returns false when this would be
    /// the last reference, which the caller must release under the cache lock.
    pub(crate) fn release_shared(&self) -> bool {
        let mut current = self.ref_count.load(Ordering::Acquire);
        while current > 1 {
            match self.ref_count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Drops a reference, returning the remaining count. Never goes below 0.
    pub(crate) fn release(&self) -> usize {
        match self
            .ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            }) {
            Ok(previous) => previous - 1,
            Err(_) => {
                warn!("Release unreferenced table share {}", self.ident);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use table::metadata::{ColumnDef, ColumnType, KeyDef, KeyKind, TableDefinitionBuilder};

    use super::*;

    fn new_share() -> TableShare {
        let definition = TableDefinitionBuilder::new("public", "orders")
            .engine("memory")
            .column(ColumnDef::new("id", ColumnType::BigInt, false))
            .column(ColumnDef::new("Region", ColumnType::Varchar, false))
            .column(ColumnDef::new("amount", ColumnType::Decimal, true))
            .key(KeyDef::new("PRIMARY", KeyKind::Primary, vec![1, 0]))
            .build()
            .unwrap();
        let ident = TableIdent::new("local", "public", "orders").unwrap();
        TableShare::new(ident, Arc::new(definition), 3)
    }

    #[test]
    fn test_derived_fields() {
        let share = new_share();
        assert_eq!(Some(1), share.column_index("region"));
        assert_eq!(None, share.column_index("missing"));
        assert!(share.is_primary_key_column("ID"));
        assert!(share.is_primary_key_column("region"));
        assert!(!share.is_primary_key_column("amount"));

        // Computed once and shared afterwards.
        assert!(Arc::ptr_eq(&share.derived_fields(), &share.derived_fields()));
    }

    #[test]
    fn test_ref_count() {
        let share = new_share();
        assert_eq!(1, share.ref_count());
        assert!(!share.release_shared());

        assert_eq!(1, share.retain());
        assert!(share.release_shared());
        assert_eq!(1, share.ref_count());

        assert_eq!(0, share.release());
        assert_eq!(0, share.release());
        assert_eq!(0, share.ref_count());
    }

    #[test]
    fn test_version() {
        let share = new_share();
        assert_eq!(3, share.version());
        share.set_version(5);
        assert_eq!(5, share.version());
        assert_eq!(3, share.generation());
        assert_eq!("memory", share.engine());
        assert_eq!(TableType::Standard, share.table_type());
    }
}
