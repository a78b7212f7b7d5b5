/// Intermediate table cache
///
/// Memoizes derived tables for the current run so each logical table is
/// computed at most once between invalidations.
///
/// # Architecture
///
/// Cache Key: logical table name (`df_concat_with_tf`, `df_tf_surname`, ...)
/// Cache Value: handle to the physical table last materialized for that name
///
/// Physical names are a pure function of `(logical name, run token)`. The run
/// token carries a session id fixed for the lifetime of the cache and an
/// epoch counter. Invalidation bumps the epoch, so every name resolves to a
/// fresh physical table afterwards, then drops the old epoch's tables on a
/// best-effort basis.
///
/// There is no eviction: this is a memo table, and growth within a run is
/// bounded by the number of distinct logical tables the caller asks for.
///
/// # Concurrency
///
/// The map lock is never held while a table is being computed, so a build
/// function may itself go through the cache. The flip side: two threads
/// missing on the same name at the same time will both compute it, and the
/// later `put` wins. Callers that need single-flight semantics must
/// serialize per logical name themselves.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{ExecutorError, Executor, InputData, TableHandle};
use crate::utils::sync::acquire_lock;
use crate::utils::table_naming::{LogicalTableName, PhysicalTableName, RunToken};

pub struct IntermediateTableCache {
    entries: Mutex<HashMap<LogicalTableName, TableHandle>>,
    run: RunToken,
    epoch: AtomicU64,
    executor: Arc<Executor>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl IntermediateTableCache {
    /// Create an empty cache with a fresh random session.
    pub fn new(executor: Arc<Executor>) -> Self {
        Self::with_run_token(executor, RunToken::random())
    }

    /// Create an empty cache starting from an explicit run token.
    pub fn with_run_token(executor: Arc<Executor>, run: RunToken) -> Self {
        log::debug!("Intermediate table cache using prefix {}", run.table_prefix());
        IntermediateTableCache {
            entries: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(run.epoch()),
            run,
            executor,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Current run token (session plus current epoch).
    pub fn run_token(&self) -> RunToken {
        RunToken::new(self.run.session(), self.epoch.load(Ordering::SeqCst))
            .unwrap_or_else(|_| self.run.clone())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Physical name `logical` resolves to under the current run token.
    pub fn physical_name(&self, logical: &LogicalTableName) -> PhysicalTableName {
        PhysicalTableName::resolve(logical, &self.run_token())
    }

    /// Look up a handle, counting a hit or a miss.
    pub fn get(&self, logical: &LogicalTableName) -> Option<TableHandle> {
        let entries = acquire_lock(&self.entries, "table cache");
        match entries.get(logical) {
            Some(handle) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "Using cached table for '{}' ({})",
                    logical,
                    handle.physical_name()
                );
                Some(handle.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Whether `logical` is cached. Does not touch the hit/miss counters.
    pub fn contains(&self, logical: &LogicalTableName) -> bool {
        acquire_lock(&self.entries, "table cache").contains_key(logical)
    }

    /// Store `handle` under `logical`, replacing any previous entry.
    pub fn put(&self, logical: LogicalTableName, handle: TableHandle) {
        let mut entries = acquire_lock(&self.entries, "table cache");
        if let Some(previous) = entries.insert(logical.clone(), handle) {
            log::debug!(
                "Replaced cached table for '{}' (was {})",
                logical,
                previous.physical_name()
            );
        }
    }

    /// Return the cached handle for `logical`, or compute it with `build`.
    ///
    /// `build` receives the physical name to materialize into and runs at most
    /// once per epoch for a given logical name. If an invalidation happens
    /// while `build` runs, the result is returned but not cached.
    pub fn get_or_compute<F, E>(&self, logical: &LogicalTableName, build: F) -> Result<TableHandle, E>
    where
        F: FnOnce(&PhysicalTableName) -> Result<TableHandle, E>,
    {
        if let Some(handle) = self.get(logical) {
            return Ok(handle);
        }

        let run = self.run_token();
        let physical = PhysicalTableName::resolve(logical, &run);
        log::debug!("Computing '{}' as {}", logical, physical);
        let handle = build(&physical)?;

        if self.epoch() == run.epoch() {
            self.put(logical.clone(), handle.clone());
        } else {
            log::debug!(
                "Cache invalidated while computing '{}'; result not cached",
                logical
            );
        }
        Ok(handle)
    }

    /// Register externally supplied data as the table for `logical` in the
    /// current run and cache it.
    pub fn register(
        &self,
        logical: &LogicalTableName,
        data: InputData,
        overwrite: bool,
    ) -> Result<TableHandle, ExecutorError> {
        let physical = self.physical_name(logical);
        let handle = self.executor.register(data, &physical, overwrite)?;
        self.put(logical.clone(), handle.clone());
        Ok(handle)
    }

    /// Forget every cached table and move to a new epoch.
    ///
    /// A no-op on an empty cache. Tables of the old epoch are then dropped
    /// through the executor; failures there are logged and otherwise
    /// ignored, since the cache no longer points at those tables.
    pub fn invalidate_all(&self) {
        let mut entries = acquire_lock(&self.entries, "table cache");
        if entries.is_empty() {
            log::debug!("Cache is empty, nothing to invalidate");
            return;
        }

        let old = self.run_token();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let dropped_entries = entries.len();
        entries.clear();
        drop(entries);
        self.invalidations.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "Invalidated {} cached tables; new table prefix {}",
            dropped_entries,
            self.run_token().table_prefix()
        );

        if let Err(e) = self.executor.delete_by_prefix(&old.table_prefix()) {
            log::warn!(
                "Could not clean up tables with prefix {}: {}",
                old.table_prefix(),
                e
            );
        }
    }

    /// Logical names currently cached, sorted.
    pub fn logical_names(&self) -> Vec<LogicalTableName> {
        let mut names: Vec<_> = acquire_lock(&self.entries, "table cache")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        acquire_lock(&self.entries, "table cache").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache metrics
    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.len(),
            epoch: self.epoch(),
        }
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub epoch: u64,
}

impl CacheMetrics {
    /// Calculate cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
