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

//! Shares owned by one session that never enter the name table.

use std::sync::Arc;

use common_catalog::TableIdent;
use common_telemetry::{debug, warn};
use snafu::{ensure, ResultExt};
use table::metadata::{TableDefinition, TableDefinitionRef};

use crate::cache::TableDefinitionCache;
use crate::error::{CorruptDefinitionSnafu, Result, SingularInUseSnafu};
use crate::share::TableShare;
use crate::SessionId;

/// A share private to one session, e.g. of a temporary table or of a table
/// being built by `CREATE TABLE`.
#[derive(Debug)]
pub struct SingularShare {
    share: TableShare,
    owner: SessionId,
}

impl SingularShare {
    pub fn share(&self) -> &TableShare {
        &self.share
    }

    pub fn ident(&self) -> &TableIdent {
        self.share.ident()
    }

    pub fn definition(&self) -> &TableDefinitionRef {
        self.share.definition()
    }

    pub fn owner(&self) -> SessionId {
        self.owner
    }

    pub fn ref_count(&self) -> usize {
        self.share.ref_count()
    }

    /// Adds a user within the owning session.
    pub fn retain(&self) {
        let _ = self.share.retain();
    }

    /// Removes a user, returning how many remain.
    pub fn release(&self) -> usize {
        self.share.release()
    }
}

impl TableDefinitionCache {
    /// Builds a share of `definition` for `session` alone, referenced once.
    pub fn open_singular(
        &self,
        session: SessionId,
        ident: &TableIdent,
        definition: TableDefinition,
    ) -> Result<SingularShare> {
        definition.validate().context(CorruptDefinitionSnafu {
            table: ident.sql_path(),
        })?;
        let share = TableShare::new(ident.clone(), Arc::new(definition), self.allocate_version());
        debug!("{} opens singular table {}", session, ident);
        Ok(SingularShare {
            share,
            owner: session,
        })
    }

    /// Releases the reference taken by [Self::open_singular]. Fails if other
    /// users of the share remain.
    pub fn close_singular(&self, singular: SingularShare) -> Result<()> {
        let remaining = singular.release();
        if remaining != 0 {
            warn!(
                "Close singular table {} of {} with {} references left",
                singular.ident(),
                singular.owner,
                remaining
            );
        }
        ensure!(
            remaining == 0,
            SingularInUseSnafu {
                table: singular.ident().sql_path(),
                ref_count: remaining,
            }
        );
        debug!("{} closed singular table {}", singular.owner, singular.ident());
        Ok(())
    }
}
