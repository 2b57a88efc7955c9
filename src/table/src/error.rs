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

use common_catalog::TableType;
use common_error::ext::ErrorExt;
use common_error::status_code::StatusCode;
use common_macro::stack_trace_debug;
use snafu::{Location, Snafu};

#[derive(Snafu)]
#[snafu(visibility(pub))]
#[stack_trace_debug]
pub enum Error {
    #[snafu(display("Invalid definition of table {}: {}", table, reason))]
    InvalidDefinition {
        table: String,
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Table engine not found: {}", engine))]
    EngineNotFound {
        engine: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Table engine {} doesn't support {} tables", engine, table_type))]
    EngineUnsupportedTableType {
        engine: String,
        table_type: TableType,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to close table engine {}", engine))]
    CloseEngine {
        engine: String,
        source: common_error::ext::BoxedError,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ErrorExt for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidDefinition { .. } => StatusCode::TableDefinitionCorrupted,
            Error::EngineNotFound { .. } | Error::EngineUnsupportedTableType { .. } => {
                StatusCode::EngineUnavailable
            }
            Error::CloseEngine { source, .. } => source.status_code(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;
