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

pub mod consts;
pub mod error;
pub mod ident;
pub mod naming;

pub use ident::{CatalogIdent, Ident, SchemaIdent, TableIdent, TableType, UserIdent};

/// Formats table fully-qualified name
#[inline]
pub fn format_full_table_name(catalog: &str, schema: &str, table: &str) -> String {
    format!("{catalog}.{schema}.{table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_full_table_name() {
        assert_eq!("local.public.t1", format_full_table_name("local", "public", "t1"));
    }
}
