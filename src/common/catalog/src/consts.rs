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

pub const DEFAULT_CATALOG_NAME: &str = "local";
pub const DEFAULT_SCHEMA_NAME: &str = "public";
/// Schema shown in messages for internal tables.
pub const TEMPORARY_SCHEMA_NAME: &str = "temporary";
/// Maximum number of characters in a single name component.
pub const MAX_NAME_LENGTH: usize = 64;
/// Prefix of private paths of temporary tables.
pub const TMP_FILE_PREFIX: &str = "#sql";
