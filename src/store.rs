//! Component id store: hands out short-lived tokens for [`ComponentId`] payloads so that they
//! can be embedded into buttons and select menus, and resolves them again when the interaction
//! comes back.
//!
//! Payloads live in two tiers: a bounded in-memory cache and the `component_ids` table. The
//! database is authoritative, the cache only saves database reads. Regular records that haven't
//! been used for [`ComponentIdStoreConfig::retention_threshold`] are deleted by a periodic sweep,
//! which is the only way a record ever disappears and the only thing eviction listeners hear
//! about.
//!
//! Inserts, reads and the sweep's delete-and-invalidate step all run under one store-wide lock.
//! Reads are serialized too; in exchange no caller can ever see a record that is evicted from
//! one tier but not the other, or race another caller inserting the same token.
//!
//! Reading a record from the database (a cache miss) refreshes its `last_used` timestamp in a
//! background task ("heating"). That write is not coupled to the read: a sweep may evict the
//! record after it was read but before the heat lands, in which case the heat finds nothing to
//! update. Callers must not rely on a successful read keeping a record alive.

use crate::{
    cache::ComponentCache,
    clock::{Clock, SystemClock},
    component_id::{ComponentId, Lifespan},
    config::ComponentIdStoreConfig,
    error::StoreError,
    eviction::{EvictedComponent, EvictionListener, EvictionListeners, SweepScheduler},
    records::ComponentRecords,
    serializer::{self, FormatError},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use uuid::Uuid;

pub struct ComponentIdStore {
    records: ComponentRecords,
    cache: ComponentCache,
    listeners: EvictionListeners,
    clock: Arc<dyn Clock>,
    retention_threshold: Duration,
    lock: tokio::sync::Mutex<()>,
    scheduler: Mutex<Option<SweepScheduler>>,
    shut_down: AtomicBool,
}

impl ComponentIdStore {
    /// Creates the store and starts its eviction scheduler. Must be called inside a tokio
    /// runtime.
    pub fn new(pool: SqlitePool, config: ComponentIdStoreConfig) -> Arc<Self> {
        Self::with_clock(pool, config, Arc::new(SystemClock))
    }

    pub(crate) fn with_clock(
        pool: SqlitePool,
        config: ComponentIdStoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let store = Arc::new(Self {
            records: ComponentRecords::new(pool),
            cache: ComponentCache::new(config.cache_capacity, config.cache_access_ttl),
            listeners: EvictionListeners::default(),
            clock,
            retention_threshold: config.retention_threshold,
            lock: tokio::sync::Mutex::new(()),
            scheduler: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });

        let scheduler = SweepScheduler::spawn(
            Arc::downgrade(&store),
            config.sweep_initial_delay,
            config.sweep_period,
        );
        *store.scheduler.lock().unwrap_or_else(|e| e.into_inner()) = Some(scheduler);

        store
    }

    /// Stores `component_id` under a fresh token and returns the token's text form
    pub async fn generate(
        &self,
        component_id: ComponentId,
        lifespan: Lifespan,
    ) -> Result<String, StoreError> {
        let payload = serializer::serialize(&component_id);
        loop {
            let token = Uuid::new_v4();
            match self
                .insert(token, component_id.clone(), &payload, lifespan)
                .await
            {
                Err(StoreError::AlreadyExists(_)) => {
                    log::warn!("Generated component id {} collided, retrying", token);
                }
                result => return result.map(|()| token.to_string()),
            }
        }
    }

    /// Resolves a token from an incoming interaction.
    ///
    /// `Ok(None)` means the token is well-formed but expired or never existed. A malformed
    /// token or an undecodable stored payload is a [`StoreError::Format`].
    pub async fn parse(&self, token: &str) -> Result<Option<ComponentId>, StoreError> {
        let token = Uuid::parse_str(token).map_err(|e| {
            FormatError::new(format!("`{}` is not a component id token: {}", token, e))
        })?;
        self.get(token).await
    }

    /// Stores `component_id` under `token`, failing with [`StoreError::AlreadyExists`] if the
    /// token is taken
    pub async fn put_or_throw(
        &self,
        token: Uuid,
        component_id: ComponentId,
        lifespan: Lifespan,
    ) -> Result<(), StoreError> {
        let payload = serializer::serialize(&component_id);
        self.insert(token, component_id, &payload, lifespan).await
    }

    async fn insert(
        &self,
        token: Uuid,
        component_id: ComponentId,
        payload: &str,
        lifespan: Lifespan,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        if self.cache.contains(token)
            || !self
                .records
                .insert_if_absent(token, payload, lifespan, self.clock.now())
                .await?
        {
            return Err(StoreError::AlreadyExists(token));
        }
        self.cache.insert(token, component_id);

        Ok(())
    }

    /// Looks up a live record. Cache hits are answered directly; a payload read from the
    /// database is put into the cache and its record is heated.
    pub async fn get(&self, token: Uuid) -> Result<Option<ComponentId>, StoreError> {
        let _guard = self.lock.lock().await;

        if let Some(component_id) = self.cache.get(token) {
            return Ok(Some(component_id));
        }

        let record = match self.records.lookup(token).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        let component_id = serializer::deserialize(&record.payload)?;

        self.cache.insert(token, component_id.clone());
        self.heat(token, self.clock.now());

        Ok(Some(component_id))
    }

    fn heat(&self, token: Uuid, now: DateTime<Utc>) {
        if self.shut_down.load(Ordering::SeqCst) {
            log::debug!("Not heating component id {}, store is shut down", token);
            return;
        }

        let records = self.records.clone();
        tokio::spawn(async move {
            match records.touch(token, now).await {
                Ok(true) => log::debug!("Heated component id {}", token),
                Ok(false) => log::debug!("Component id {} was evicted before heating", token),
                Err(e) => log::warn!("Failed to heat component id {}: {}", token, e),
            }
        });
    }

    /// Subscribes to records evicted from now on
    pub fn add_eviction_listener(&self) -> EvictionListener {
        self.listeners.subscribe()
    }

    /// Calls `callback` for every record evicted from now on, on a separate task
    pub fn add_eviction_callback(
        &self,
        callback: impl Fn(EvictedComponent) + Send + Sync + 'static,
    ) {
        let mut listener = self.add_eviction_listener();
        tokio::spawn(async move {
            while let Some(evicted) = listener.recv().await {
                callback(evicted);
            }
        });
    }

    /// Runs one eviction cycle: deletes every regular record older than the retention
    /// threshold, drops it from the cache and notifies the listeners. Returns the number of
    /// deleted records.
    ///
    /// A deleted row that doesn't decode is logged and skipped; it never stops the cache
    /// invalidation or the notification of the other rows.
    pub async fn sweep(&self) -> Result<usize, StoreError> {
        let cutoff = self.cutoff();

        let (deleted, evicted) = {
            let _guard = self.lock.lock().await;
            let deleted = self.records.delete_stale(cutoff).await?;

            let mut evicted = Vec::with_capacity(deleted.len());
            for record in &deleted {
                match Uuid::parse_str(&record.token) {
                    Ok(token) => {
                        self.cache.invalidate(token);
                        evicted.push((token, record.payload.clone()));
                    }
                    Err(e) => log::warn!(
                        "Evicted component id row with invalid token {:?}: {}",
                        record.token,
                        e
                    ),
                }
            }
            (deleted.len(), evicted)
        };

        for (token, payload) in evicted {
            match serializer::deserialize(&payload) {
                Ok(component_id) => self.listeners.notify(&EvictedComponent {
                    token,
                    component_id,
                }),
                Err(e) => log::warn!(
                    "Evicted component id {} with undecodable payload: {}",
                    token,
                    e
                ),
            }
        }

        if deleted == 0 {
            log::debug!("No component ids to evict");
        } else {
            log::info!("Evicted {} component ids unused since {}", deleted, cutoff);
        }
        Ok(deleted)
    }

    fn cutoff(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.retention_threshold)
            .ok()
            .and_then(|retention| self.clock.now().checked_sub_signed(retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Stops the eviction scheduler and spawns no further heating tasks. Background tasks that
    /// are already running are left to finish.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);

        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
            log::info!("Component id store shut down");
        }
    }
}
