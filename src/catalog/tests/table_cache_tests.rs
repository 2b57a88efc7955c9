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

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use catalog::error::{Error, LoadTableSnafu, Result};
    use catalog::loader::{FsTableLoader, MemoryTableLoader};
    use catalog::{
        EntryState, OpenOutcome, PlaceholderMode, PlaceholderPolicy, SessionId, TableCacheConfig,
        TableDefinitionCache, TableHandle, TableLoader,
    };
    use common_catalog::{TableIdent, TableType};
    use common_error::ext::{BoxedError, ErrorExt};
    use common_error::mock::MockError;
    use common_error::status_code::StatusCode;
    use common_test_util::temp_dir::create_temp_dir;
    use rand::Rng;
    use snafu::ResultExt;
    use table::engine::manager::{MemoryTableEngineManager, TableEngineManager};
    use table::engine::TableEngineRef;
    use table::metadata::{
        ColumnDef, ColumnType, KeyDef, KeyKind, TableDefinition, TableDefinitionBuilder,
    };
    use table::test_util::MockTableEngine;

    /// Counts loads and can be slowed down or made to fail.
    struct CountingLoader {
        tables: MemoryTableLoader,
        loads: AtomicUsize,
        delay: Duration,
        failures: AtomicUsize,
    }

    impl CountingLoader {
        fn new(tables: &[&str], delay: Duration) -> Self {
            let loader = MemoryTableLoader::new();
            for name in tables {
                let _ = loader.insert(&new_ident(name), new_definition(name));
            }
            Self {
                tables: loader,
                loads: AtomicUsize::new(0),
                delay,
                failures: AtomicUsize::new(0),
            }
        }

        fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TableLoader for CountingLoader {
        async fn load(&self, ident: &TableIdent) -> Result<TableDefinition> {
            let _ = self.loads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let fail = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(MockError::new(StatusCode::StorageUnavailable))
                    .map_err(BoxedError::new)
                    .context(LoadTableSnafu {
                        table: ident.sql_path(),
                    });
            }
            self.tables.load(ident).await
        }
    }

    fn new_ident(name: &str) -> TableIdent {
        TableIdent::new("local", "public", name).unwrap()
    }

    fn new_definition(name: &str) -> TableDefinition {
        TableDefinitionBuilder::new("public", name)
            .engine("memory")
            .column(ColumnDef::new("id", ColumnType::BigInt, false))
            .column(ColumnDef::new("value", ColumnType::Double, true))
            .key(KeyDef::new("PRIMARY", KeyKind::Primary, vec![0]))
            .build()
            .unwrap()
    }

    fn new_config(size: usize, timeout: Duration) -> TableCacheConfig {
        TableCacheConfig {
            table_definition_cache_size: size,
            lock_wait_timeout: timeout,
            ..Default::default()
        }
    }

    fn new_cache(config: TableCacheConfig, loader: Arc<CountingLoader>) -> TableDefinitionCache {
        common_telemetry::init_default_ut_logging();
        let engine: TableEngineRef = Arc::new(MockTableEngine::new("memory"));
        let engines = MemoryTableEngineManager::with_engines([engine]);
        TableDefinitionCache::new(config, loader, Arc::new(engines))
    }

    /// Checks that exactly the unreferenced shares are linked as unused.
    fn assert_consistent(cache: &TableDefinitionCache) {
        let snapshot = cache.snapshot();
        for entry in &snapshot {
            match entry.state {
                EntryState::Unused => assert_eq!(0, entry.ref_count, "{:?}", entry),
                EntryState::Referenced => assert!(entry.ref_count > 0, "{:?}", entry),
                EntryState::Opening | EntryState::Exclusive => {
                    assert!(entry.version.is_none());
                    assert!(entry.owner.is_some());
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_open_loads_once() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::from_millis(50)));
        let cache = new_cache(new_config(8, Duration::from_secs(5)), loader.clone());

        let tasks = (0..16)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_open(SessionId(i), &new_ident("t1"), None)
                        .await
                        .unwrap()
                })
            })
            .collect::<Vec<_>>();
        let results = futures::future::try_join_all(tasks).await.unwrap();

        assert_eq!(1, loader.loads());
        let loaded = results
            .iter()
            .filter(|(_, outcome)| *outcome == OpenOutcome::Loaded)
            .count();
        assert_eq!(1, loaded);
        let first = results[0].0.share().clone();
        for (handle, _) in &results {
            assert!(Arc::ptr_eq(&first, handle.share()));
        }
        assert_eq!(16, first.ref_count());

        drop(results);
        assert_eq!(0, first.ref_count());
        assert_eq!(1, cache.unused_count());
        assert_consistent(&cache);
    }

    #[tokio::test]
    async fn test_lru_eviction_order() {
        let names = ["t1", "t2", "t3", "t4"];
        let loader = Arc::new(CountingLoader::new(&names, Duration::ZERO));
        let cache = new_cache(new_config(3, Duration::from_secs(1)), loader.clone());

        for name in &names[..3] {
            let (handle, _) = cache
                .get_or_open(SessionId(1), &new_ident(name), None)
                .await
                .unwrap();
            cache.release(handle);
        }
        // Touch t1 so t2 becomes the least recently used.
        let (handle, outcome) = cache
            .get_or_open(SessionId(1), &new_ident("t1"), None)
            .await
            .unwrap();
        assert_eq!(OpenOutcome::Hit, outcome);
        drop(handle);

        let (handle, _) = cache
            .get_or_open(SessionId(1), &new_ident("t4"), None)
            .await
            .unwrap();
        drop(handle);

        assert_eq!(3, cache.cached_count());
        assert!(!cache.contains(&new_ident("t2")));
        for name in ["t1", "t3", "t4"] {
            assert!(cache.contains(&new_ident(name)));
        }
        assert_eq!(4, loader.loads());
        assert_consistent(&cache);
    }

    #[tokio::test]
    async fn test_evicted_share_is_reloaded() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::ZERO));
        let cache = new_cache(new_config(0, Duration::from_secs(1)), loader.clone());
        let ident = new_ident("t1");

        let (handle, outcome) = cache.get_or_open(SessionId(1), &ident, None).await.unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert_eq!(1, cache.cached_count());
        drop(handle);
        // Nothing unused may stay cached.
        assert_eq!(0, cache.cached_count());
        assert_eq!(0, cache.evict_unused(0));

        let (_handle, outcome) = cache.get_or_open(SessionId(1), &ident, None).await.unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert_eq!(2, loader.loads());
        assert_consistent(&cache);
    }

    #[tokio::test]
    async fn test_evict_unused_forces_reload() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::ZERO));
        let cache = new_cache(new_config(8, Duration::from_secs(1)), loader.clone());
        let ident = new_ident("t1");

        let (handle, _) = cache.get_or_open(SessionId(1), &ident, None).await.unwrap();
        drop(handle);
        assert_eq!(1, cache.unused_count());
        assert_eq!(1, cache.evict_unused(0));
        assert!(!cache.contains(&ident));

        let (_handle, outcome) = cache.get_or_open(SessionId(2), &ident, None).await.unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert_eq!(2, loader.loads());
    }

    #[tokio::test]
    async fn test_exclusive_placeholder_blocks_other_sessions() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::ZERO));
        let cache = new_cache(new_config(8, Duration::from_secs(1)), loader.clone());
        let ident = new_ident("t1");
        let ddl = SessionId(1);

        cache
            .insert_placeholder(ddl, &ident, PlaceholderMode::Exclusive)
            .unwrap();

        let err = cache
            .get_or_open(SessionId(2), &ident, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NameLockedByDdl { .. }));
        assert_eq!(StatusCode::TableNameLocked, err.status_code());
        assert!(err.is_retryable());

        // The lock owner reads through a private handle.
        let (private, outcome) = cache.get_or_open(ddl, &ident, None).await.unwrap();
        assert_eq!(OpenOutcome::Private, outcome);
        assert!(private.is_private());
        assert_eq!(0, cache.cached_count());
        drop(private);

        let mut definition = new_definition("t1");
        definition
            .columns
            .push(ColumnDef::new("extra", ColumnType::Varchar, true));
        let published = cache.publish(ddl, &ident, definition).unwrap();
        assert!(!cache.snapshot().iter().any(|e| e.state == EntryState::Exclusive));

        let (handle, outcome) = cache
            .get_or_open(SessionId(2), &ident, None)
            .await
            .unwrap();
        assert_eq!(OpenOutcome::Hit, outcome);
        assert!(Arc::ptr_eq(published.share(), handle.share()));
        assert_eq!(Some(2), handle.share().column_index("EXTRA"));
        assert_eq!(1, loader.loads());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_exclusive_policy_waits_for_publish() {
        let loader = Arc::new(CountingLoader::new(&[], Duration::ZERO));
        let config = TableCacheConfig {
            exclusive_placeholder_policy: PlaceholderPolicy::Block,
            ..new_config(8, Duration::from_secs(5))
        };
        let cache = new_cache(config, loader.clone());
        let ident = new_ident("created");
        cache
            .insert_placeholder(SessionId(1), &ident, PlaceholderMode::Exclusive)
            .unwrap();

        let reader = {
            let cache = cache.clone();
            let ident = ident.clone();
            tokio::spawn(async move { cache.get_or_open(SessionId(2), &ident, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        let created = cache
            .publish(SessionId(1), &ident, new_definition("created"))
            .unwrap();
        let (handle, outcome) = reader.await.unwrap().unwrap();
        assert_eq!(OpenOutcome::HitAfterWait, outcome);
        assert!(Arc::ptr_eq(created.share(), handle.share()));
        assert_eq!(0, loader.loads());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_removed_placeholder_wakes_waiters() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::ZERO));
        let config = TableCacheConfig {
            exclusive_placeholder_policy: PlaceholderPolicy::Block,
            ..new_config(8, Duration::from_secs(5))
        };
        let cache = new_cache(config, loader.clone());
        let ident = new_ident("t1");
        cache
            .insert_placeholder(SessionId(1), &ident, PlaceholderMode::Exclusive)
            .unwrap();

        let reader = {
            let cache = cache.clone();
            let ident = ident.clone();
            tokio::spawn(async move { cache.get_or_open(SessionId(2), &ident, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.remove_placeholder(SessionId(1), &ident).unwrap();

        let (_handle, outcome) = reader.await.unwrap().unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert_eq!(1, loader.loads());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lock_wait_timeout() {
        let loader = Arc::new(CountingLoader::new(&["slow"], Duration::from_millis(500)));
        let cache = new_cache(new_config(8, Duration::from_millis(50)), loader.clone());
        let ident = new_ident("slow");

        let opener = {
            let cache = cache.clone();
            let ident = ident.clone();
            tokio::spawn(async move { cache.get_or_open(SessionId(1), &ident, None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = cache
            .get_or_open(SessionId(2), &ident, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockWaitTimeout { .. }));
        assert_eq!(StatusCode::DeadlineExceeded, err.status_code());

        let (_handle, outcome) = opener.await.unwrap().unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert_eq!(1, loader.loads());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_load_wakes_waiters() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::from_millis(100)));
        loader.fail_next(1);
        let cache = new_cache(new_config(8, Duration::from_secs(5)), loader.clone());
        let ident = new_ident("t1");

        let first = {
            let cache = cache.clone();
            let ident = ident.clone();
            tokio::spawn(async move { cache.get_or_open(SessionId(1), &ident, None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = {
            let cache = cache.clone();
            let ident = ident.clone();
            tokio::spawn(async move { cache.get_or_open(SessionId(2), &ident, None).await })
        };

        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::LoadTable { .. }));
        assert_eq!(StatusCode::StorageUnavailable, err.status_code());

        // The waiter retries the lookup and loads the table itself.
        let (handle, outcome) = second.await.unwrap().unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert_eq!("t1", handle.definition().name);
        assert_eq!(2, loader.loads());
        assert_consistent(&cache);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_open_releases_placeholder() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::from_secs(10)));
        let cache = new_cache(new_config(8, Duration::from_secs(1)), loader.clone());
        let ident = new_ident("t1");

        let opener = {
            let cache = cache.clone();
            let ident = ident.clone();
            tokio::spawn(async move { cache.get_or_open(SessionId(1), &ident, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.contains(&ident));
        assert_eq!(EntryState::Opening, cache.snapshot()[0].state);

        opener.abort();
        assert!(opener.await.unwrap_err().is_cancelled());
        assert!(!cache.contains(&ident));
    }

    #[tokio::test]
    async fn test_invalidate_marks_handles_stale() {
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::ZERO));
        let cache = new_cache(new_config(8, Duration::from_secs(1)), loader.clone());
        let ident = new_ident("t1");

        let (old, _) = cache.get_or_open(SessionId(1), &ident, None).await.unwrap();
        let mut last = old.opened_version();
        for _ in 0..3 {
            let version = cache.invalidate(&ident).unwrap();
            assert!(version > last);
            last = version;
        }
        assert!(old.is_stale());
        assert_eq!("t1", old.definition().name);

        let err = cache
            .get_or_open(SessionId(2), &ident, Some(old.opened_version()))
            .await
            .unwrap_err();
        assert_eq!(StatusCode::RequestOutdated, err.status_code());

        let (new, outcome) = cache
            .get_or_open(SessionId(2), &ident, Some(last))
            .await
            .unwrap();
        assert_eq!(OpenOutcome::Hit, outcome);
        assert!(!new.is_stale());
        assert_eq!(2, new.share().ref_count());
        assert_eq!(1, loader.loads());
    }

    #[tokio::test]
    async fn test_flush_retires_old_shares() {
        let names = ["t1", "t2", "t3"];
        let loader = Arc::new(CountingLoader::new(&names, Duration::ZERO));
        let cache = new_cache(new_config(8, Duration::from_secs(1)), loader.clone());

        let mut handles = vec![];
        for name in names {
            let (handle, _) = cache
                .get_or_open(SessionId(1), &new_ident(name), None)
                .await
                .unwrap();
            handles.push(handle);
        }
        // t3 stays referenced across the flush.
        let held = handles.pop().unwrap();
        drop(handles);
        assert_eq!(2, cache.unused_count());

        assert_eq!(2, cache.flush());
        assert_eq!(1, cache.cached_count());

        drop(held);
        assert_eq!(0, cache.cached_count());
        assert_eq!(0, cache.unused_count());

        let (_handle, outcome) = cache
            .get_or_open(SessionId(1), &new_ident("t1"), None)
            .await
            .unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert_eq!(4, loader.loads());
    }

    #[tokio::test]
    async fn test_bind_engine() {
        common_telemetry::init_default_ut_logging();
        let loader = Arc::new(CountingLoader::new(&["t1"], Duration::ZERO));
        let internal = new_ident("internal_t");
        let mut definition = new_definition("internal_t");
        definition.table_type = TableType::Internal;
        let _ = loader.tables.insert(&internal, definition);
        let no_engine = new_ident("no_engine");
        let mut definition = new_definition("no_engine");
        definition.engine = "missing".to_string();
        let _ = loader.tables.insert(&no_engine, definition);

        let engines = MemoryTableEngineManager::new();
        engines.register_engine(Arc::new(
            MockTableEngine::new("Memory").with_unsupported(TableType::Internal),
        ));
        let cache = TableDefinitionCache::new(
            new_config(8, Duration::from_secs(1)),
            loader,
            Arc::new(engines),
        );

        let (handle, _) = cache
            .get_or_open(SessionId(1), &new_ident("t1"), None)
            .await
            .unwrap();
        // Engine names resolve case-insensitively.
        assert_eq!("Memory", cache.bind_engine(&handle).unwrap().name());

        for ident in [internal, no_engine] {
            let (handle, _) = cache.get_or_open(SessionId(1), &ident, None).await.unwrap();
            let err = cache.bind_engine(&handle).err().unwrap();
            assert!(matches!(err, Error::EngineUnavailable { .. }), "{:?}", err);
            assert_eq!(StatusCode::EngineUnavailable, err.status_code());
        }
    }

    #[tokio::test]
    async fn test_open_from_data_dir() {
        common_telemetry::init_default_ut_logging();
        let dir = create_temp_dir("table_cache");
        let fs_loader = FsTableLoader::new(dir.path());
        let ident = new_ident("Orders");
        fs_loader
            .store(&ident, &new_definition("Orders"))
            .await
            .unwrap();
        let corrupted = new_ident("broken");
        let mut definition = new_definition("broken");
        definition.columns.clear();
        fs_loader.store(&corrupted, &definition).await.unwrap();

        let cache = TableDefinitionCache::new(
            new_config(8, Duration::from_secs(1)),
            Arc::new(fs_loader),
            Arc::new(MemoryTableEngineManager::new()),
        );
        let same_table = TableIdent::new("local", "PUBLIC", "orders").unwrap();
        let (handle, outcome) = cache
            .get_or_open(SessionId(1), &same_table, None)
            .await
            .unwrap();
        assert_eq!(OpenOutcome::Loaded, outcome);
        assert!(handle.share().is_primary_key_column("ID"));

        let err = cache
            .get_or_open(SessionId(1), &corrupted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CorruptDefinition { .. }));
        assert!(!err.is_retryable());
        assert!(!cache.contains(&corrupted));
    }

    enum Op {
        Open(usize),
        Close,
        Invalidate(usize),
        Evict,
        Flush,
    }

    fn random_op(rng: &mut impl Rng, tables: usize) -> Op {
        match rng.gen_range(0..100) {
            0..=49 => Op::Open(rng.gen_range(0..tables)),
            50..=84 => Op::Close,
            85..=92 => Op::Invalidate(rng.gen_range(0..tables)),
            93..=97 => Op::Evict,
            _ => Op::Flush,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_random_interleaving_keeps_invariants() {
        const TABLES: usize = 6;
        const CACHE_SIZE: usize = 3;
        let names = (0..TABLES).map(|i| format!("t{i}")).collect::<Vec<_>>();
        let name_refs = names.iter().map(String::as_str).collect::<Vec<_>>();
        let loader = Arc::new(CountingLoader::new(&name_refs, Duration::ZERO));
        let cache = new_cache(
            new_config(CACHE_SIZE, Duration::from_secs(10)),
            loader.clone(),
        );

        let mut rng = common_test_util::seeded_rng();
        let tasks = (0..8u64)
            .map(|session| {
                let cache = cache.clone();
                let names = names.clone();
                let seed = rng.gen::<u64>();
                tokio::spawn(async move {
                    let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(seed);
                    let mut handles: Vec<TableHandle> = vec![];
                    for _ in 0..300 {
                        match random_op(&mut rng, names.len()) {
                            Op::Open(i) => {
                                let ident = new_ident(&names[i]);
                                let (handle, _) = cache
                                    .get_or_open(SessionId(session), &ident, None)
                                    .await
                                    .unwrap();
                                assert_eq!(names[i], handle.definition().name);
                                assert!(handle.share().ref_count() > 0);
                                handles.push(handle);
                            }
                            Op::Close if !handles.is_empty() => {
                                let i = rng.gen_range(0..handles.len());
                                cache.release(handles.swap_remove(i));
                            }
                            Op::Close => {}
                            Op::Invalidate(i) => {
                                let _ = cache.invalidate(&new_ident(&names[i]));
                            }
                            Op::Evict => {
                                let _ = cache.evict_unused(CACHE_SIZE);
                            }
                            Op::Flush => {
                                let _ = cache.flush();
                            }
                        }
                        assert_consistent(&cache);
                        tokio::task::yield_now().await;
                    }
                    handles
                })
            })
            .collect::<Vec<_>>();

        let handles = futures::future::try_join_all(tasks).await.unwrap();
        let shares = handles
            .iter()
            .flatten()
            .map(|handle| handle.share().clone())
            .collect::<Vec<_>>();
        drop(handles);

        for share in &shares {
            assert_eq!(0, share.ref_count());
        }
        assert!(cache.cached_count() <= CACHE_SIZE);
        assert_eq!(cache.cached_count(), cache.unused_count());
        for entry in cache.snapshot() {
            assert_eq!(EntryState::Unused, entry.state);
            assert_eq!(0, entry.ref_count);
        }
    }
}
