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

use std::fmt;

use common_catalog::TableIdent;
use tokio::sync::watch;

use crate::SessionId;

/// Why a name slot is occupied by a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderMode {
    /// The first opener is loading the definition.
    Opening,
    /// A DDL statement holds the name.
    Exclusive,
}

impl fmt::Display for PlaceholderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceholderMode::Opening => write!(f, "opening"),
            PlaceholderMode::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Receives `true` once the placeholder it was subscribed to is resolved.
pub(crate) type PlaceholderWatcher = watch::Receiver<bool>;

/// Occupies a name slot without exposing any metadata.
///
/// Waiters subscribe to the placeholder and are woken when it is resolved,
/// that is, replaced by a share or removed. Dropping a placeholder resolves
/// it as well.
pub(crate) struct Placeholder {
    ident: TableIdent,
    mode: PlaceholderMode,
    owner: SessionId,
    /// Distinguishes this placeholder from later ones on the same key.
    token: u64,
    /// Inserted through `insert_placeholder` rather than by a lookup.
    claimed: bool,
    notifier: watch::Sender<bool>,
}

impl Placeholder {
    pub(crate) fn new(
        ident: TableIdent,
        mode: PlaceholderMode,
        owner: SessionId,
        token: u64,
        claimed: bool,
    ) -> Self {
        let (notifier, _) = watch::channel(false);
        Self {
            ident,
            mode,
            owner,
            token,
            claimed,
            notifier,
        }
    }

    pub(crate) fn ident(&self) -> &TableIdent {
        &self.ident
    }

    pub(crate) fn mode(&self) -> PlaceholderMode {
        self.mode
    }

    pub(crate) fn owner(&self) -> SessionId {
        self.owner
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    pub(crate) fn is_claimed_by(&self, session: SessionId) -> bool {
        self.claimed && self.owner == session
    }

    pub(crate) fn subscribe(&self) -> PlaceholderWatcher {
        self.notifier.subscribe()
    }

    pub(crate) fn resolve(&self) {
        let _ = self.notifier.send_replace(true);
    }
}

impl Drop for Placeholder {
    fn drop(&mut self) {
        self.resolve();
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholder")
            .field("ident", &self.ident)
            .field("mode", &self.mode)
            .field("owner", &self.owner)
            .field("token", &self.token)
            .field("claimed", &self.claimed)
            .finish()
    }
}
