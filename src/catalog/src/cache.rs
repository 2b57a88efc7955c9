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

//! The table definition cache.
//!
//! All structural state (the name table, the unused list and the counters)
//! lives behind one mutex that is never held across an `.await` or while a
//! handle is dropped. Reference counts are atomics, but moving one across
//! zero always happens under that mutex together with the unused list
//! update, so "linked iff unreferenced" holds whenever the mutex is free.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common_catalog::{TableIdent, TableType};
use common_telemetry::{debug, info, warn};
use parking_lot::Mutex;
use snafu::{ensure, OptionExt, ResultExt};
use table::engine::manager::TableEngineManagerRef;
use table::engine::TableEngineRef;
use table::metadata::{TableDefinition, TableDefinitionRef};
use tokio::time::Instant;

use crate::config::{PlaceholderPolicy, TableCacheConfig};
use crate::error::{
    CorruptDefinitionSnafu, EngineUnavailableSnafu, LockWaitTimeoutSnafu,
    NameLockedByDdlSnafu, PlaceholderNotFoundSnafu, Result, StaleSnafu,
    UnsupportedTableTypeSnafu,
};
use crate::loader::TableLoaderRef;
use crate::metrics::{
    METRIC_TABLE_CACHE_EVICTED, METRIC_TABLE_CACHE_HIT, METRIC_TABLE_CACHE_LOAD_ELAPSED,
    METRIC_TABLE_CACHE_LOAD_FAILED, METRIC_TABLE_CACHE_MISS, METRIC_TABLE_CACHE_PLACEHOLDER_WAIT,
    METRIC_TABLE_CACHE_SHARES,
};
use crate::placeholder::{Placeholder, PlaceholderMode, PlaceholderWatcher};
use crate::share::TableShare;
use crate::unused::UnusedList;
use crate::SessionId;

/// How [TableDefinitionCache::get_or_open] obtained its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A cached share was found at once.
    Hit,
    /// A cached share was found after waiting on another opener.
    HitAfterWait,
    /// The definition was loaded and published by this call.
    Loaded,
    /// The caller holds a claim on the name and got an uncached handle.
    Private,
}

/// State of one name table entry in a [CachedTableEntry].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Referenced,
    Unused,
    Opening,
    Exclusive,
}

/// A copy of one name table entry.
#[derive(Debug, Clone)]
pub struct CachedTableEntry {
    pub ident: TableIdent,
    pub state: EntryState,
    /// `None` for placeholders.
    pub version: Option<u64>,
    pub ref_count: usize,
    pub engine: Option<String>,
    /// Session holding a placeholder.
    pub owner: Option<SessionId>,
}

enum CacheEntry {
    Share(Arc<TableShare>),
    Placeholder(Placeholder),
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    unused: UnusedList,
    /// Number of shares in `entries`.
    share_count: usize,
    next_version: u64,
    /// Shares loaded before this version are not handed out any more.
    refresh_version: u64,
}

impl CacheState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            unused: UnusedList::default(),
            share_count: 0,
            next_version: 1,
            refresh_version: 0,
        }
    }

    fn allocate_version(&mut self) -> u64 {
        let version = self.next_version;
        self.next_version += 1;
        version
    }

    fn share(&self, key: &str) -> Option<&Arc<TableShare>> {
        match self.entries.get(key) {
            Some(CacheEntry::Share(share)) => Some(share),
            _ => None,
        }
    }

    fn placeholder(&self, key: &str) -> Option<&Placeholder> {
        match self.entries.get(key) {
            Some(CacheEntry::Placeholder(placeholder)) => Some(placeholder),
            _ => None,
        }
    }

    /// Puts a share into the slot of `key`, dropping (and so resolving) the
    /// placeholder that held it.
    fn insert_share(&mut self, key: &str, share: Arc<TableShare>) {
        let previous = self
            .entries
            .insert(key.to_string(), CacheEntry::Share(share));
        if let Some(CacheEntry::Share(previous)) = previous {
            warn!("Replace cached share of table {}", previous.ident());
            previous.detach();
            let _ = self.unused.unlink(key);
        } else {
            self.share_count += 1;
            METRIC_TABLE_CACHE_SHARES.inc();
        }
    }

    fn remove_share(&mut self, key: &str) -> Option<Arc<TableShare>> {
        self.share(key)?;
        let Some(CacheEntry::Share(share)) = self.entries.remove(key) else {
            return None;
        };
        let _ = self.unused.unlink(key);
        self.share_count -= 1;
        METRIC_TABLE_CACHE_SHARES.dec();
        Some(share)
    }

    /// Removes the share of `key`. Referenced shares are detached and
    /// destroyed by their last release.
    fn discard_share(&mut self, key: &str) -> bool {
        let Some(share) = self.remove_share(key) else {
            return false;
        };
        if share.ref_count() == 0 {
            METRIC_TABLE_CACHE_EVICTED.inc();
            debug!("Destroy share of table {}", share.ident());
        } else {
            share.detach();
            debug!(
                "Detach share of table {} with {} references",
                share.ident(),
                share.ref_count()
            );
        }
        true
    }

    /// Removes the placeholder of `key` if it is still the one with `token`.
    fn take_placeholder(&mut self, key: &str, token: u64) -> Option<Placeholder> {
        if self.placeholder(key)?.token() != token {
            return None;
        }
        match self.entries.remove(key) {
            Some(CacheEntry::Placeholder(placeholder)) => Some(placeholder),
            _ => None,
        }
    }

    fn evict_to(&mut self, limit: usize) -> usize {
        let mut evicted = 0;
        while self.share_count > limit {
            let Some(key) = self.unused.pop_lru() else {
                break;
            };
            if self.discard_share(&key) {
                evicted += 1;
            }
        }
        evicted
    }

    fn cull(&mut self, predicate: impl Fn(&TableShare) -> bool) -> usize {
        let keys = self
            .unused
            .iter()
            .filter(|key| {
                self.share(key)
                    .map(|share| predicate(share.as_ref()))
                    .unwrap_or(false)
            })
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut culled = 0;
        for key in keys {
            if self.discard_share(&key) {
                culled += 1;
            }
        }
        culled
    }
}

struct CacheInner {
    config: TableCacheConfig,
    loader: TableLoaderRef,
    engines: TableEngineManagerRef,
    state: Mutex<CacheState>,
    next_token: AtomicU64,
}

enum Lookup {
    Hit(TableHandle),
    Wait(PlaceholderWatcher),
    /// The caller's own exclusive claim occupies the name.
    LoadPrivate,
    /// An opening placeholder with this token was inserted for the caller.
    Load(u64),
}

impl CacheInner {
    fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn lookup(
        self: &Arc<Self>,
        session: SessionId,
        ident: &TableIdent,
        expected_version: Option<u64>,
    ) -> Result<Lookup> {
        let key = ident.canonical_path();
        let mut state = self.state.lock();

        if let Some(share) = state.share(key).cloned() {
            if share.generation() < state.refresh_version {
                info!("Detach table {} loaded before the last flush", ident);
                let _ = state.discard_share(key);
            } else {
                ensure_version(ident, expected_version, share.version())?;
                if share.retain() == 0 {
                    let _ = state.unused.unlink(key);
                }
                return Ok(Lookup::Hit(TableHandle::cached(share, self.clone())));
            }
        }

        if let Some(placeholder) = state.placeholder(key) {
            if placeholder.is_claimed_by(session) {
                return Ok(Lookup::LoadPrivate);
            }
            return match self.config.policy(placeholder.mode()) {
                PlaceholderPolicy::Block => Ok(Lookup::Wait(placeholder.subscribe())),
                PlaceholderPolicy::Fail => NameLockedByDdlSnafu {
                    table: ident.sql_path(),
                    owner: placeholder.owner().to_string(),
                }
                .fail(),
            };
        }

        let token = self.next_token();
        let placeholder = Placeholder::new(
            ident.clone(),
            PlaceholderMode::Opening,
            session,
            token,
            false,
        );
        let _ = state
            .entries
            .insert(key.to_string(), CacheEntry::Placeholder(placeholder));
        Ok(Lookup::Load(token))
    }

    async fn load_definition(&self, ident: &TableIdent) -> Result<TableDefinition> {
        let _timer = METRIC_TABLE_CACHE_LOAD_ELAPSED.start_timer();
        let result = match self.loader.load(ident).await {
            Ok(definition) => definition
                .validate()
                .context(CorruptDefinitionSnafu {
                    table: ident.sql_path(),
                })
                .map(|_| definition),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            METRIC_TABLE_CACHE_LOAD_FAILED.inc();
            warn!("Failed to load table {}, error: {}", ident, e);
        }
        result
    }

    fn release(&self, share: &Arc<TableShare>) {
        if share.release_shared() {
            return;
        }

        let mut state = self.state.lock();
        if share.release() > 0 {
            return;
        }
        if share.is_detached() {
            METRIC_TABLE_CACHE_EVICTED.inc();
            debug!("Destroy detached share of table {}", share.ident());
            return;
        }

        let key = share.ident().canonical_path();
        if share.generation() < state.refresh_version {
            let _ = state.discard_share(key);
            return;
        }
        let _ = state.unused.link(key);
        let evicted = state.evict_to(self.config.table_definition_cache_size);
        if evicted > 0 {
            debug!("Evicted {} unused table shares", evicted);
        }
    }
}

fn ensure_version(ident: &TableIdent, expected: Option<u64>, actual: u64) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => StaleSnafu {
            table: ident.sql_path(),
            expected,
            actual,
        }
        .fail(),
        _ => Ok(()),
    }
}

/// Removes the opening placeholder of an abandoned load, waking its waiters.
struct OpeningGuard<'a> {
    inner: &'a CacheInner,
    key: &'a str,
    token: u64,
    armed: bool,
}

impl OpeningGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let placeholder = self.inner.state.lock().take_placeholder(self.key, self.token);
        if placeholder.is_some() {
            debug!("Abandon opening of table {}", self.key);
        }
    }
}

/// An open reference to a table share.
///
/// Dropping the handle releases the reference.
pub struct TableHandle {
    share: Arc<TableShare>,
    /// `None` for private handles that never enter the cache.
    cache: Option<Arc<CacheInner>>,
    opened_version: u64,
}

impl TableHandle {
    fn cached(share: Arc<TableShare>, cache: Arc<CacheInner>) -> Self {
        let opened_version = share.version();
        Self {
            share,
            cache: Some(cache),
            opened_version,
        }
    }

    fn private(share: Arc<TableShare>) -> Self {
        let opened_version = share.version();
        Self {
            share,
            cache: None,
            opened_version,
        }
    }

    pub fn share(&self) -> &Arc<TableShare> {
        &self.share
    }

    pub fn ident(&self) -> &TableIdent {
        self.share.ident()
    }

    pub fn definition(&self) -> &TableDefinitionRef {
        self.share.definition()
    }

    /// Version of the share when this handle was opened.
    pub fn opened_version(&self) -> u64 {
        self.opened_version
    }

    /// Whether the share was invalidated or dropped since the handle was
    /// opened. The definition stays readable either way.
    pub fn is_stale(&self) -> bool {
        self.share.is_detached() || self.share.version() != self.opened_version
    }

    pub fn is_private(&self) -> bool {
        self.cache.is_none()
    }
}

impl Clone for TableHandle {
    fn clone(&self) -> Self {
        let _ = self.share.retain();
        Self {
            share: self.share.clone(),
            cache: self.cache.clone(),
            opened_version: self.opened_version,
        }
    }
}

impl Drop for TableHandle {
    fn drop(&mut self) {
        match &self.cache {
            Some(cache) => cache.release(&self.share),
            None => {
                let _ = self.share.release();
            }
        }
    }
}

impl fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle")
            .field("table", self.share.ident())
            .field("opened_version", &self.opened_version)
            .field("private", &self.is_private())
            .finish()
    }
}

/// Shares table definitions between sessions.
///
/// Cloning the cache is cheap and every clone operates on the same state.
#[derive(Clone)]
pub struct TableDefinitionCache {
    inner: Arc<CacheInner>,
}

impl TableDefinitionCache {
    pub fn new(
        mut config: TableCacheConfig,
        loader: TableLoaderRef,
        engines: TableEngineManagerRef,
    ) -> Self {
        config.sanitize();
        info!("Create table definition cache, config: {:?}", config);
        Self {
            inner: Arc::new(CacheInner {
                config,
                loader,
                engines,
                state: Mutex::new(CacheState::new()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &TableCacheConfig {
        &self.inner.config
    }

    /// Opens `ident`, loading its definition on first use.
    ///
    /// With `expected_version`, fails with `Stale` instead of returning a
    /// share of another version. Waits on a placeholder of another session
    /// share the single `lock_wait_timeout` deadline of this call.
    pub async fn get_or_open(
        &self,
        session: SessionId,
        ident: &TableIdent,
        expected_version: Option<u64>,
    ) -> Result<(TableHandle, OpenOutcome)> {
        ensure!(
            ident.table_type() != TableType::Temporary,
            UnsupportedTableTypeSnafu {
                table: ident.sql_path(),
                table_type: ident.table_type(),
            }
        );

        let timeout = self.inner.config.lock_wait_timeout;
        // `None` when the timeout is beyond what an `Instant` can represent.
        let deadline = Instant::now().checked_add(timeout);
        let mut waited = false;
        loop {
            match self.inner.lookup(session, ident, expected_version)? {
                Lookup::Hit(handle) => {
                    METRIC_TABLE_CACHE_HIT.inc();
                    let outcome = if waited {
                        OpenOutcome::HitAfterWait
                    } else {
                        OpenOutcome::Hit
                    };
                    return Ok((handle, outcome));
                }
                Lookup::Wait(mut watcher) => {
                    METRIC_TABLE_CACHE_PLACEHOLDER_WAIT.inc();
                    debug!("{} waits for table {} to be opened", session, ident);
                    // A closed channel also means the placeholder is gone.
                    let wait = async move {
                        let _ = watcher.wait_for(|resolved| *resolved).await;
                    };
                    let in_time = match deadline {
                        Some(deadline) => {
                            tokio::time::timeout_at(deadline, wait).await.is_ok()
                        }
                        None => {
                            wait.await;
                            true
                        }
                    };
                    ensure!(
                        in_time,
                        LockWaitTimeoutSnafu {
                            table: ident.sql_path(),
                            timeout,
                        }
                    );
                    waited = true;
                }
                Lookup::LoadPrivate => {
                    let definition = self.inner.load_definition(ident).await?;
                    let version = self.inner.state.lock().allocate_version();
                    let share = TableShare::new(ident.clone(), Arc::new(definition), version);
                    let handle = TableHandle::private(Arc::new(share));
                    ensure_version(ident, expected_version, handle.opened_version())?;
                    debug!("{} opens private share of table {}", session, ident);
                    return Ok((handle, OpenOutcome::Private));
                }
                Lookup::Load(token) => {
                    let handle = self.load_and_publish(session, ident, token).await?;
                    ensure_version(ident, expected_version, handle.opened_version())?;
                    return Ok((handle, OpenOutcome::Loaded));
                }
            }
        }
    }

    async fn load_and_publish(
        &self,
        session: SessionId,
        ident: &TableIdent,
        token: u64,
    ) -> Result<TableHandle> {
        METRIC_TABLE_CACHE_MISS.inc();
        let key = ident.canonical_path();
        let mut guard = OpeningGuard {
            inner: &self.inner,
            key,
            token,
            armed: true,
        };
        let definition = self.inner.load_definition(ident).await?;

        let handle = {
            let mut state = self.inner.state.lock();
            guard.disarm();
            let _placeholder = state
                .take_placeholder(key, token)
                .context(PlaceholderNotFoundSnafu {
                    table: ident.sql_path(),
                    session: session.to_string(),
                })?;
            let version = state.allocate_version();
            let share = Arc::new(TableShare::new(
                ident.clone(),
                Arc::new(definition),
                version,
            ));
            state.insert_share(key, share.clone());
            let _ = state.evict_to(self.inner.config.table_definition_cache_size);
            TableHandle::cached(share, self.inner.clone())
        };
        info!(
            "Loaded table {} at version {}",
            ident,
            handle.opened_version()
        );
        Ok(handle)
    }

    /// Closes a handle. Same as dropping it.
    pub fn release(&self, handle: TableHandle) {
        drop(handle);
    }

    /// Claims the name of `ident` for `session`.
    ///
    /// An unused share of the name is destroyed and a referenced one is
    /// detached, so later lookups see the placeholder.
    pub fn insert_placeholder(
        &self,
        session: SessionId,
        ident: &TableIdent,
        mode: PlaceholderMode,
    ) -> Result<()> {
        let key = ident.canonical_path();
        let mut state = self.inner.state.lock();
        if let Some(placeholder) = state.placeholder(key) {
            return NameLockedByDdlSnafu {
                table: ident.sql_path(),
                owner: placeholder.owner().to_string(),
            }
            .fail();
        }
        let _ = state.discard_share(key);

        let placeholder =
            Placeholder::new(ident.clone(), mode, session, self.inner.next_token(), true);
        let _ = state
            .entries
            .insert(key.to_string(), CacheEntry::Placeholder(placeholder));
        info!("{} claims table {} in {} mode", session, ident, mode);
        Ok(())
    }

    /// Abandons the claim of `session` on `ident`, waking waiters.
    pub fn remove_placeholder(&self, session: SessionId, ident: &TableIdent) -> Result<()> {
        let key = ident.canonical_path();
        let mut state = self.inner.state.lock();
        let owned = state
            .placeholder(key)
            .map(|placeholder| placeholder.is_claimed_by(session))
            .unwrap_or(false);
        ensure!(
            owned,
            PlaceholderNotFoundSnafu {
                table: ident.sql_path(),
                session: session.to_string(),
            }
        );
        let _ = state.entries.remove(key);
        info!("{} releases claim on table {}", session, ident);
        Ok(())
    }

    /// Replaces the claim of `session` on `ident` with a share of
    /// `definition` and returns a handle to it.
    pub fn publish(
        &self,
        session: SessionId,
        ident: &TableIdent,
        definition: TableDefinition,
    ) -> Result<TableHandle> {
        definition.validate().context(CorruptDefinitionSnafu {
            table: ident.sql_path(),
        })?;

        let key = ident.canonical_path();
        let handle = {
            let mut state = self.inner.state.lock();
            let owned = state
                .placeholder(key)
                .map(|placeholder| placeholder.is_claimed_by(session))
                .unwrap_or(false);
            ensure!(
                owned,
                PlaceholderNotFoundSnafu {
                    table: ident.sql_path(),
                    session: session.to_string(),
                }
            );
            let version = state.allocate_version();
            let share = Arc::new(TableShare::new(
                ident.clone(),
                Arc::new(definition),
                version,
            ));
            state.insert_share(key, share.clone());
            let _ = state.evict_to(self.inner.config.table_definition_cache_size);
            TableHandle::cached(share, self.inner.clone())
        };
        info!(
            "{} published table {} at version {}",
            session,
            ident,
            handle.opened_version()
        );
        Ok(handle)
    }

    /// Moves the cached share of `ident` to a fresh version. Returns the new
    /// version, or `None` if the table isn't cached.
    pub fn invalidate(&self, ident: &TableIdent) -> Option<u64> {
        let mut state = self.inner.state.lock();
        let share = state.share(ident.canonical_path())?.clone();
        let version = state.allocate_version();
        share.set_version(version);
        info!("Invalidate table {}, new version {}", ident, version);
        Some(version)
    }

    /// Destroys unused shares from the LRU end until at most `limit` shares
    /// are cached. Returns the number destroyed.
    pub fn evict_unused(&self, limit: usize) -> usize {
        let evicted = self.inner.state.lock().evict_to(limit);
        if evicted > 0 {
            info!("Evicted {} unused table shares", evicted);
        }
        evicted
    }

    /// Destroys unused shares whose version is below `threshold`.
    pub fn cull_by_version(&self, threshold: u64) -> usize {
        let culled = self
            .inner
            .state
            .lock()
            .cull(|share| share.version() < threshold);
        if culled > 0 {
            info!(
                "Culled {} unused table shares below version {}",
                culled, threshold
            );
        }
        culled
    }

    /// Removes `ident` from the cache. Returns false if it wasn't cached.
    pub fn drop_table(&self, ident: &TableIdent) -> bool {
        let dropped = self
            .inner
            .state
            .lock()
            .discard_share(ident.canonical_path());
        if dropped {
            info!("Drop table {} from cache", ident);
        }
        dropped
    }

    /// Retires every cached share. Unused shares are destroyed now, others
    /// once they are looked up or released.
    pub fn flush(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.refresh_version = state.next_version;
        let refresh_version = state.refresh_version;
        let culled = state.cull(|share| share.generation() < refresh_version);
        info!(
            "Flush table cache at version {}, destroyed {} unused shares",
            refresh_version, culled
        );
        culled
    }

    /// Number of shares in the name table.
    pub fn cached_count(&self) -> usize {
        self.inner.state.lock().share_count
    }

    pub fn unused_count(&self) -> usize {
        self.inner.state.lock().unused.len()
    }

    /// Whether a share or placeholder occupies the name of `ident`.
    pub fn contains(&self, ident: &TableIdent) -> bool {
        self.inner
            .state
            .lock()
            .entries
            .contains_key(ident.canonical_path())
    }

    /// Copies every entry of the name table, ordered by canonical path.
    pub fn snapshot(&self) -> Vec<CachedTableEntry> {
        let state = self.inner.state.lock();
        let mut entries = state
            .entries
            .iter()
            .map(|(key, entry)| match entry {
                CacheEntry::Share(share) => {
                    let ref_count = share.ref_count();
                    let entry_state = if state.unused.contains(key) {
                        EntryState::Unused
                    } else {
                        EntryState::Referenced
                    };
                    CachedTableEntry {
                        ident: share.ident().clone(),
                        state: entry_state,
                        version: Some(share.version()),
                        ref_count,
                        engine: Some(share.engine().to_string()),
                        owner: None,
                    }
                }
                CacheEntry::Placeholder(placeholder) => CachedTableEntry {
                    ident: placeholder.ident().clone(),
                    state: match placeholder.mode() {
                        PlaceholderMode::Opening => EntryState::Opening,
                        PlaceholderMode::Exclusive => EntryState::Exclusive,
                    },
                    version: None,
                    ref_count: 0,
                    engine: None,
                    owner: Some(placeholder.owner()),
                },
            })
            .collect::<Vec<_>>();
        drop(state);

        entries.sort_by(|a, b| a.ident.canonical_path().cmp(b.ident.canonical_path()));
        entries
    }

    /// Resolves the storage engine serving the table of `handle`.
    pub fn bind_engine(&self, handle: &TableHandle) -> Result<TableEngineRef> {
        let share = handle.share();
        self.inner
            .engines
            .engine_for(share.engine(), share.table_type())
            .context(EngineUnavailableSnafu {
                table: handle.ident().sql_path(),
            })
    }

    pub(crate) fn allocate_version(&self) -> u64 {
        self.inner.state.lock().allocate_version()
    }
}
