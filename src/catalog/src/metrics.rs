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

use lazy_static::lazy_static;
use prometheus::*;

lazy_static! {
    pub static ref METRIC_TABLE_CACHE_HIT: IntCounter = register_int_counter!(
        "greptime_table_cache_hit",
        "table cache lookups served by a cached share"
    )
    .unwrap();
    pub static ref METRIC_TABLE_CACHE_MISS: IntCounter = register_int_counter!(
        "greptime_table_cache_miss",
        "table cache lookups that loaded a definition"
    )
    .unwrap();
    pub static ref METRIC_TABLE_CACHE_LOAD_ELAPSED: Histogram = register_histogram!(
        "greptime_table_cache_load_elapsed",
        "table cache definition load elapsed"
    )
    .unwrap();
    pub static ref METRIC_TABLE_CACHE_LOAD_FAILED: IntCounter = register_int_counter!(
        "greptime_table_cache_load_failed",
        "table cache definition load failures"
    )
    .unwrap();
    pub static ref METRIC_TABLE_CACHE_EVICTED: IntCounter = register_int_counter!(
        "greptime_table_cache_evicted",
        "table shares destroyed by the table cache"
    )
    .unwrap();
    pub static ref METRIC_TABLE_CACHE_SHARES: IntGauge = register_int_gauge!(
        "greptime_table_cache_shares",
        "table shares held in the name table"
    )
    .unwrap();
    pub static ref METRIC_TABLE_CACHE_PLACEHOLDER_WAIT: IntCounter = register_int_counter!(
        "greptime_table_cache_placeholder_wait",
        "waits on a placeholder of another session"
    )
    .unwrap();
}
