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

use std::any::Any;
use std::time::Duration;

use common_catalog::TableType;
use common_error::ext::{BoxedError, ErrorExt};
use common_error::status_code::StatusCode;
use common_macro::stack_trace_debug;
use snafu::{Location, Snafu};

#[derive(Snafu)]
#[snafu(visibility(pub))]
#[stack_trace_debug]
pub enum Error {
    #[snafu(display("Table not found: {}", table))]
    TableNotFound {
        table: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Definition of table {} is corrupted", table))]
    CorruptDefinition {
        table: String,
        source: table::error::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Table {} is locked by a DDL statement of {}", table, owner))]
    NameLockedByDdl {
        table: String,
        owner: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Table {} is stale, expected version {}, current version {}",
        table,
        expected,
        actual
    ))]
    Stale {
        table: String,
        expected: u64,
        actual: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Timed out after {:?} waiting for table {} to be opened", timeout, table))]
    LockWaitTimeout {
        table: String,
        timeout: Duration,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Storage engine of table {} is unavailable", table))]
    EngineUnavailable {
        table: String,
        source: table::error::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("No placeholder of {} for table {}", session, table))]
    PlaceholderNotFound {
        table: String,
        session: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Singular table {} is still in use, {} references left",
        table,
        ref_count
    ))]
    SingularInUse {
        table: String,
        ref_count: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{} tables can't be shared through the cache: {}", table_type, table))]
    UnsupportedTableType {
        table: String,
        table_type: TableType,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to load table {}", table))]
    LoadTable {
        table: String,
        source: BoxedError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to read table definition from {}", path))]
    ReadDefinition {
        path: String,
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to write table definition to {}", path))]
    WriteDefinition {
        path: String,
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to decode table definition from {}", path))]
    DecodeDefinition {
        path: String,
        #[snafu(source)]
        error: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to encode definition of table {}", table))]
    EncodeDefinition {
        table: String,
        #[snafu(source)]
        error: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to load table cache options"))]
    LoadOptions {
        source: common_config::error::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl ErrorExt for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::TableNotFound { .. } => StatusCode::TableNotFound,
            Error::CorruptDefinition { .. } | Error::DecodeDefinition { .. } => {
                StatusCode::TableDefinitionCorrupted
            }
            Error::NameLockedByDdl { .. } => StatusCode::TableNameLocked,
            Error::Stale { .. } => StatusCode::RequestOutdated,
            Error::LockWaitTimeout { .. } => StatusCode::DeadlineExceeded,
            Error::EngineUnavailable { .. } => StatusCode::EngineUnavailable,
            Error::PlaceholderNotFound { .. } => StatusCode::InvalidArguments,
            Error::SingularInUse { .. } => StatusCode::TableInUse,
            Error::UnsupportedTableType { .. } => StatusCode::Unsupported,
            Error::LoadTable { source, .. } => source.status_code(),
            Error::ReadDefinition { .. } | Error::WriteDefinition { .. } => {
                StatusCode::StorageUnavailable
            }
            Error::EncodeDefinition { .. } => StatusCode::Unexpected,
            Error::LoadOptions { source, .. } => source.status_code(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
