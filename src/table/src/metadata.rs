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

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use common_catalog::TableType;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{InvalidDefinitionSnafu, Result};

pub type TableDefinitionRef = Arc<TableDefinition>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInt,
    Double,
    Decimal,
    Varchar,
    Blob,
    Date,
    DateTime,
    Timestamp,
    Time,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    /// Maximum length for string and binary columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            length: None,
            default_value: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Primary,
    Unique,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDef {
    pub name: String,
    pub kind: KeyKind,
    /// Indices of the key columns in [TableDefinition::columns].
    pub parts: Vec<usize>,
}

impl KeyDef {
    pub fn new(name: impl Into<String>, kind: KeyKind, parts: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            kind,
            parts,
        }
    }
}

/// The structural metadata of a table: what a loader reads from storage
/// and what a cached share exposes to sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(pattern = "owned")]
pub struct TableDefinition {
    #[builder(setter(into))]
    pub schema: String,
    #[builder(setter(into))]
    pub name: String,
    #[builder(default)]
    #[serde(default)]
    pub table_type: TableType,
    #[builder(default)]
    pub columns: Vec<ColumnDef>,
    #[builder(default)]
    #[serde(default)]
    pub keys: Vec<KeyDef>,
    #[builder(setter(into))]
    pub engine: String,
    #[builder(default)]
    #[serde(default)]
    pub options: HashMap<String, String>,
    #[builder(default, setter(into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableDefinitionBuilder {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.get_or_insert_with(Vec::new).push(column);
        self
    }

    pub fn key(mut self, key: KeyDef) -> Self {
        self.keys.get_or_insert_with(Vec::new).push(key);
        self
    }
}

impl TableDefinition {
    fn invalid<T>(&self, reason: impl Into<String>) -> Result<T> {
        InvalidDefinitionSnafu {
            table: format!("{}.{}", self.schema, self.name),
            reason,
        }
        .fail()
    }

    /// Checks that the definition describes a usable table.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return self.invalid("table has no columns");
        }
        if self.engine.is_empty() {
            return self.invalid("engine name is empty");
        }

        let mut column_names = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.name.is_empty() {
                return self.invalid("column name is empty");
            }
            if !column_names.insert(column.name.to_lowercase()) {
                return self.invalid(format!("duplicate column {}", column.name));
            }
        }

        let mut key_names = HashSet::with_capacity(self.keys.len());
        let mut has_primary_key = false;
        for key in &self.keys {
            if !key_names.insert(key.name.to_lowercase()) {
                return self.invalid(format!("duplicate key {}", key.name));
            }
            if key.parts.is_empty() {
                return self.invalid(format!("key {} has no columns", key.name));
            }

            let mut parts = HashSet::with_capacity(key.parts.len());
            for part in &key.parts {
                let Some(column) = self.columns.get(*part) else {
                    return self.invalid(format!(
                        "key {} refers to column {} of {}",
                        key.name,
                        part,
                        self.columns.len()
                    ));
                };
                if !parts.insert(*part) {
                    return self.invalid(format!(
                        "key {} lists column {} twice",
                        key.name, column.name
                    ));
                }
                if key.kind == KeyKind::Primary && column.nullable {
                    return self.invalid(format!(
                        "primary key column {} is nullable",
                        column.name
                    ));
                }
            }

            if key.kind == KeyKind::Primary {
                if has_primary_key {
                    return self.invalid("more than one primary key");
                }
                has_primary_key = true;
            }
        }

        Ok(())
    }

    pub fn primary_key(&self) -> Option<&KeyDef> {
        self.keys.iter().find(|key| key.kind == KeyKind::Primary)
    }

    /// Position of the column named `name`, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        match (self.primary_key(), self.column_index(name)) {
            (Some(key), Some(index)) => key.parts.contains(&index),
            _ => false,
        }
    }
}
