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

use std::collections::{BTreeMap, HashMap};

/// LRU order of the keys of cached shares nobody references.
///
/// Each link takes a fresh sequence number, so the smallest sequence is the
/// least recently unused key.
#[derive(Debug, Default)]
pub(crate) struct UnusedList {
    order: BTreeMap<u64, String>,
    positions: HashMap<String, u64>,
    next_seq: u64,
}

impl UnusedList {
    /// Links `key` at the most recently used end. Returns false if it was
    /// already linked, in which case the list is left untouched.
    pub(crate) fn link(&mut self, key: &str) -> bool {
        if self.positions.contains_key(key) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let _ = self.order.insert(seq, key.to_string());
        let _ = self.positions.insert(key.to_string(), seq);
        true
    }

    /// Returns whether `key` was linked.
    pub(crate) fn unlink(&mut self, key: &str) -> bool {
        match self.positions.remove(key) {
            Some(seq) => {
                let _ = self.order.remove(&seq);
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Removes and returns the least recently used key.
    pub(crate) fn pop_lru(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        let _ = self.positions.remove(&key);
        Some(key)
    }

    /// Keys from the least to the most recently used.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}
