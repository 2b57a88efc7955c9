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

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use common_catalog::naming::decode_name;
use common_catalog::{SchemaIdent, TableIdent};
use common_telemetry::{debug, warn};
use snafu::ResultExt;
use table::metadata::TableDefinition;

use crate::error::{
    DecodeDefinitionSnafu, EncodeDefinitionSnafu, ReadDefinitionSnafu, Result,
    TableNotFoundSnafu, WriteDefinitionSnafu,
};
use crate::loader::TableLoader;

const DEFINITION_FILE_EXT: &str = "json";

/// Reads definitions from JSON files under a data directory.
///
/// The definition of a table lives at `<root>/<canonical path>.json`, so
/// every schema is a directory of encoded table names.
#[derive(Debug, Clone)]
pub struct FsTableLoader {
    root: PathBuf,
}

impl FsTableLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn definition_path(&self, ident: &TableIdent) -> PathBuf {
        self.root
            .join(format!("{}.{}", ident.canonical_path(), DEFINITION_FILE_EXT))
    }

    /// Writes the definition of `ident`, replacing any previous one.
    pub async fn store(&self, ident: &TableIdent, definition: &TableDefinition) -> Result<()> {
        let path = self.definition_path(ident);
        let path_str = path.display().to_string();
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .context(WriteDefinitionSnafu { path: &path_str })?;
        }

        let bytes = serde_json::to_vec_pretty(definition).context(EncodeDefinitionSnafu {
            table: ident.sql_path(),
        })?;
        tokio::fs::write(&path, bytes)
            .await
            .context(WriteDefinitionSnafu { path: path_str })?;
        debug!("Stored definition of table {} at {}", ident, path.display());
        Ok(())
    }

    /// Removes the definition of `ident`. Returns false if there was none.
    pub async fn remove(&self, ident: &TableIdent) -> Result<bool> {
        let path = self.definition_path(ident);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(WriteDefinitionSnafu {
                path: path.display().to_string(),
            }),
        }
    }

    /// Lists the (lower-cased) names of tables stored in `schema`.
    pub async fn table_names(&self, schema: &SchemaIdent) -> Result<Vec<String>> {
        let dir = self.root.join(schema.canonical_path());
        let dir_str = dir.display().to_string();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e).context(ReadDefinitionSnafu { path: dir_str }),
        };

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .context(ReadDefinitionSnafu { path: &dir_str })?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DEFINITION_FILE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match decode_name(stem) {
                Some(name) => names.push(name),
                None => warn!("Skip definition file with invalid name {}", path.display()),
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl TableLoader for FsTableLoader {
    async fn load(&self, ident: &TableIdent) -> Result<TableDefinition> {
        let path = self.definition_path(ident);
        let path_str = path.display().to_string();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return TableNotFoundSnafu {
                    table: ident.sql_path(),
                }
                .fail();
            }
            Err(e) => return Err(e).context(ReadDefinitionSnafu { path: path_str }),
        };

        serde_json::from_slice(&bytes).context(DecodeDefinitionSnafu { path: path_str })
    }
}
