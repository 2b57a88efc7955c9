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

//! Identifiers of catalogs, schemas, tables and users.
//!
//! Every identifier derives a canonical path from its encoded name
//! components when it is built. Equality and hashing only look at that path.

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::consts::{MAX_NAME_LENGTH, TEMPORARY_SCHEMA_NAME, TMP_FILE_PREFIX};
use crate::error::{InvalidNameSnafu, NoParentSnafu, Result};
use crate::naming::encode_name;

/// How a table is stored and shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    #[default]
    Standard,
    /// Private to the session that created it.
    Temporary,
    /// Intermediate tables of DDL statements. Names are not encoded.
    Internal,
    Function,
}

impl Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableType::Standard => "STANDARD",
            TableType::Temporary => "TEMPORARY",
            TableType::Internal => "INTERNAL",
            TableType::Function => "FUNCTION",
        };
        write!(f, "{name}")
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<()> {
    ensure!(
        !name.is_empty(),
        InvalidNameSnafu {
            kind,
            name,
            reason: "name is empty",
        }
    );
    ensure!(
        name.chars().count() <= MAX_NAME_LENGTH,
        InvalidNameSnafu {
            kind,
            name,
            reason: "name is longer than 64 characters",
        }
    );
    ensure!(
        !name.contains('\0'),
        InvalidNameSnafu {
            kind,
            name,
            reason: "name contains a NUL character",
        }
    );
    ensure!(
        !name.ends_with(' '),
        InvalidNameSnafu {
            kind,
            name,
            reason: "name ends with a space",
        }
    );
    Ok(())
}

macro_rules! impl_path_eq {
    ($ty: ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.path == other.path
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.path.hash(state);
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct CatalogIdent {
    name: String,
    path: String,
}

impl CatalogIdent {
    pub fn new(name: &str) -> Result<Self> {
        check_name("catalog", name)?;
        Ok(Self {
            name: name.to_string(),
            path: encode_name(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canonical_path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct SchemaIdent {
    catalog: CatalogIdent,
    name: String,
    path: String,
}

impl SchemaIdent {
    pub fn new(catalog: &str, schema: &str) -> Result<Self> {
        Self::with_catalog(CatalogIdent::new(catalog)?, schema)
    }

    pub fn with_catalog(catalog: CatalogIdent, schema: &str) -> Result<Self> {
        check_name("schema", schema)?;
        let path = format!("{}/{}", catalog.path, encode_name(schema));
        Ok(Self {
            catalog,
            name: schema.to_string(),
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The catalog this schema belongs to.
    pub fn catalog(&self) -> &CatalogIdent {
        &self.catalog
    }

    pub fn canonical_path(&self) -> &str {
        &self.path
    }
}

static TMP_TABLE_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone)]
pub struct TableIdent {
    schema: SchemaIdent,
    name: String,
    table_type: TableType,
    path: String,
}

impl TableIdent {
    /// Identifier of a standard table.
    pub fn new(catalog: &str, schema: &str, table: &str) -> Result<Self> {
        Self::with_type(catalog, schema, table, TableType::Standard)
    }

    /// Identifier of a table of the given type. Temporary tables built here
    /// belong to session 0, see [TableIdent::temporary].
    pub fn with_type(
        catalog: &str,
        schema: &str,
        table: &str,
        table_type: TableType,
    ) -> Result<Self> {
        let schema = SchemaIdent::new(catalog, schema)?;
        if table_type == TableType::Temporary {
            return Self::temporary_in(schema, table, 0);
        }

        check_name("table", table)?;
        let table_component = match table_type {
            TableType::Internal => table.to_string(),
            _ => encode_name(table),
        };
        let path = format!("{}/{}", schema.path, table_component);
        Ok(Self {
            schema,
            name: table.to_string(),
            table_type,
            path,
        })
    }

    /// Identifier of a temporary table created by `session_id`.
    ///
    /// Its canonical path is a private `#sql<pid>_<session>_<n>` path, unique
    /// within the process, so two temporary tables never compare equal even
    /// when they share a name.
    pub fn temporary(catalog: &str, schema: &str, table: &str, session_id: u64) -> Result<Self> {
        Self::temporary_in(SchemaIdent::new(catalog, schema)?, table, session_id)
    }

    fn temporary_in(schema: SchemaIdent, table: &str, session_id: u64) -> Result<Self> {
        check_name("table", table)?;
        let counter = TMP_TABLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = format!(
            "{}{}_{}_{}",
            TMP_FILE_PREFIX,
            std::process::id(),
            session_id,
            counter
        );
        Ok(Self {
            schema,
            name: table.to_string(),
            table_type: TableType::Temporary,
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    /// The schema this table belongs to.
    pub fn schema(&self) -> &SchemaIdent {
        &self.schema
    }

    pub fn catalog(&self) -> &CatalogIdent {
        self.schema.catalog()
    }

    pub fn canonical_path(&self) -> &str {
        &self.path
    }

    /// Name of the table as shown to users.
    pub fn sql_path(&self) -> String {
        match self.table_type {
            TableType::Standard | TableType::Function => {
                format!("{}.{}", self.schema.name, self.name)
            }
            TableType::Internal => format!("{}.{}", TEMPORARY_SCHEMA_NAME, self.name),
            TableType::Temporary => format!("{}.#{}", self.schema.name, self.name),
        }
    }

    pub fn full_name(&self) -> String {
        crate::format_full_table_name(self.catalog().name(), self.schema.name(), &self.name)
    }
}

impl Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_path())
    }
}

#[derive(Debug, Clone)]
pub struct UserIdent {
    user: String,
    host: String,
    path: String,
}

impl UserIdent {
    /// `host` may be empty, meaning any host.
    pub fn new(user: &str, host: &str) -> Result<Self> {
        check_name("user", user)?;
        if !host.is_empty() {
            check_name("host", host)?;
        }
        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            path: format!("{}/{}", encode_name(user), encode_name(host)),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn canonical_path(&self) -> &str {
        &self.path
    }
}

impl_path_eq!(CatalogIdent);
impl_path_eq!(SchemaIdent);
impl_path_eq!(TableIdent);
impl_path_eq!(UserIdent);

/// Any kind of identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ident {
    Catalog(CatalogIdent),
    Schema(SchemaIdent),
    Table(TableIdent),
    User(UserIdent),
}

impl Ident {
    pub fn canonical_path(&self) -> &str {
        match self {
            Ident::Catalog(ident) => ident.canonical_path(),
            Ident::Schema(ident) => ident.canonical_path(),
            Ident::Table(ident) => ident.canonical_path(),
            Ident::User(ident) => ident.canonical_path(),
        }
    }

    /// Returns the identifier one level up. Catalogs and users have none.
    pub fn parent(&self) -> Result<Ident> {
        match self {
            Ident::Table(ident) => Ok(Ident::Schema(ident.schema().clone())),
            Ident::Schema(ident) => Ok(Ident::Catalog(ident.catalog().clone())),
            Ident::Catalog(_) | Ident::User(_) => NoParentSnafu {
                ident: self.to_string(),
            }
            .fail(),
        }
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Catalog(ident) => write!(f, "catalog {}", ident.name()),
            Ident::Schema(ident) => write!(f, "schema {}", ident.name()),
            Ident::Table(ident) => write!(f, "table {}", ident.sql_path()),
            Ident::User(ident) => write!(f, "user {}@{}", ident.user(), ident.host()),
        }
    }
}

impl From<CatalogIdent> for Ident {
    fn from(ident: CatalogIdent) -> Self {
        Ident::Catalog(ident)
    }
}

impl From<SchemaIdent> for Ident {
    fn from(ident: SchemaIdent) -> Self {
        Ident::Schema(ident)
    }
}

impl From<TableIdent> for Ident {
    fn from(ident: TableIdent) -> Self {
        Ident::Table(ident)
    }
}

impl From<UserIdent> for Ident {
    fn from(ident: UserIdent) -> Self {
        Ident::User(ident)
    }
}
