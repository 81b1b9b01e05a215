//! Analysis Gateway: cache-fronted calls to the completion backend.
//!
//! The caller always gets the model's raw answer as a `String`, whether it
//! came from the cache or the model. The cache holds that string JSON-encoded
//! (see [`encode_entry`]), and a hit decodes it back to the identical string.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStore, decode_entry, encode_entry, make_cache_key};
use crate::config::DEFAULT_CACHE_TTL_SECS;
use crate::llm::{CompletionBackend, ModelError};
use crate::metrics::{CACHE_ERRORS, CACHE_HITS, CACHE_MISSES, MODEL_CALLS, MODEL_ERRORS};
use crate::prompt::build_prompt;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayOptions {
    pub ttl: Duration,
    /// Treat cache failures as misses instead of failing the request
    pub fail_open: bool,
    /// Coalesce concurrent misses for the same key into one model call
    pub single_flight: bool,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fail_open: false,
            single_flight: false,
        }
    }
}

/// Per-gateway lookup outcomes, one per request. Mirrors the process-wide
/// Prometheus counters.
#[derive(Debug, Default)]
pub struct GatewayStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl GatewayStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

type InFlightMap = DashMap<String, Arc<Mutex<()>>>;

// A request's claim on the per-key lock. Dropping it (on completion or
// cancellation) removes the map entry once no other request holds it.
struct FlightSlot<'a> {
    map: &'a InFlightMap,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> FlightSlot<'a> {
    fn join(map: &'a InFlightMap, key: &'a str) -> Self {
        let lock = map
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self { map, key, lock }
    }
}

impl Drop for FlightSlot<'_> {
    fn drop(&mut self) {
        // map's copy + ours: nobody else is waiting on this key
        self.map.remove_if(self.key, |_, l| {
            Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) <= 2
        });
    }
}

#[derive(Clone)]
pub struct AnalysisGateway {
    cache: Arc<dyn CacheStore>,
    backend: Arc<dyn CompletionBackend>,
    options: GatewayOptions,
    in_flight: Arc<InFlightMap>,
    stats: Arc<GatewayStats>,
}

impl AnalysisGateway {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        backend: Arc<dyn CompletionBackend>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            cache,
            backend,
            options,
            in_flight: Arc::new(DashMap::new()),
            stats: Arc::new(GatewayStats::default()),
        }
    }

    pub fn options(&self) -> GatewayOptions {
        self.options
    }

    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    pub async fn analyze(&self, text: &str) -> Result<String, GatewayError> {
        let cache_key = make_cache_key(text);

        if let Some(hit) = self.lookup(&cache_key, true).await? {
            return Ok(hit);
        }

        if !self.options.single_flight {
            return self.compute(&cache_key, text).await;
        }

        let slot = FlightSlot::join(&self.in_flight, &cache_key);
        let _guard = slot.lock.lock().await;
        // whoever held the lock before us may have filled the cache;
        // this request's miss is already counted
        match self.lookup(&cache_key, false).await? {
            Some(hit) => Ok(hit),
            None => self.compute(&cache_key, text).await,
        }
    }

    async fn lookup(&self, cache_key: &str, record: bool) -> Result<Option<String>, GatewayError> {
        let stored = match self.cache.get(cache_key).await {
            Ok(stored) => stored,
            Err(e) => return self.absorb_cache_error(cache_key, e).map(|()| None),
        };

        let Some(stored) = stored else {
            if record {
                self.record_miss();
            }
            debug!(cache_key, "cache miss");
            return Ok(None);
        };

        match decode_entry(&stored) {
            Ok(raw) => {
                if record {
                    CACHE_HITS.inc();
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                }
                debug!(cache_key, "cache hit");
                Ok(Some(raw))
            }
            Err(e) => self.absorb_cache_error(cache_key, e).map(|()| None),
        }
    }

    fn record_miss(&self) {
        CACHE_MISSES.inc();
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
    }

    async fn compute(&self, cache_key: &str, text: &str) -> Result<String, GatewayError> {
        let prompt = build_prompt(text);

        MODEL_CALLS.inc();
        let raw = self.backend.complete(&prompt).await.inspect_err(|e| {
            MODEL_ERRORS.inc();
            warn!(cache_key, model_id = self.backend.model_id(), error = %e, "model call failed");
        })?;
        info!(cache_key, model_id = self.backend.model_id(), answer_len = raw.len(), "model answered");

        let stored = encode_entry(&raw)?;
        if let Err(e) = self.cache.set(cache_key, &stored, self.options.ttl).await {
            self.absorb_cache_error(cache_key, e)?;
        }

        Ok(raw)
    }

    // Ok(()) means the error was logged and the request carries on uncached
    fn absorb_cache_error(&self, cache_key: &str, err: CacheError) -> Result<(), GatewayError> {
        CACHE_ERRORS.inc();
        if self.options.fail_open {
            warn!(cache_key, error = %err, "cache error ignored, continuing without cache");
            Ok(())
        } else {
            warn!(cache_key, error = %err, "cache error");
            Err(err.into())
        }
    }
}
