use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::Instant;

const KEY_PREFIX: &str = "analysis";

// Deadline used when `now + ttl` does not fit in an Instant
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 86_400);

// An unreachable cache should fail the request quickly, not after a long backoff
const REDIS_CONNECT_RETRIES: usize = 1;
const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

// Minimum gap between full scans for expired in-memory entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CacheError {
    /// Store unreachable or command rejected
    #[error("cache backend: {0}")]
    Backend(String),
    /// Stored payload could not be decoded
    #[error("cache payload: {0}")]
    Serialization(String),
}

/// Key-value store holding analysis results.
///
/// `set` overwrites any existing value (last writer wins) and the store owns
/// expiry from then on.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

// Create a cache key (hash of the request text)
pub fn make_cache_key(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    format!("{KEY_PREFIX}:{hash:x}")
}

/// Encodes a raw model answer for storage (as a JSON string literal).
pub fn encode_entry(raw: &str) -> Result<String, CacheError> {
    serde_json::to_string(raw).map_err(|e| CacheError::Serialization(format!("serialize: {e}")))
}

/// Inverse of [`encode_entry`]. Fails on anything that is not a JSON string.
pub fn decode_entry(stored: &str) -> Result<String, CacheError> {
    serde_json::from_str::<String>(stored)
        .map_err(|e| CacheError::Serialization(format!("deserialize: {e}")))
}

// Redis-backed store

/// Redis cache sharing one connection manager across all requests.
///
/// The manager is created on first use, so startup does not require Redis to
/// be up. It multiplexes commands over a single socket and reconnects after
/// connection loss.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
}

impl RedisStore {
    /// Only validates the URL; the connection is made on first use.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Backend(format!("invalid URL: {e}")))?;
        Ok(Self {
            client,
            conn: Arc::new(OnceCell::new()),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .conn
            .get_or_try_init(|| async {
                tracing::info!("connecting to redis");
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(REDIS_CONNECT_RETRIES)
                    .set_connection_timeout(REDIS_CONNECT_TIMEOUT);
                ConnectionManager::new_with_config(self.client.clone(), config)
                    .await
                    .map_err(|e| CacheError::Backend(format!("connection failed: {e}")))
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| CacheError::Backend(format!("GET failed: {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        // SETEX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::Backend(format!("SET failed: {e}")))?;
        tracing::debug!(cache_key = key, ttl_secs, "stored in redis");
        Ok(())
    }
}

// In-process store

// Cache entry with expiry deadline
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// TTL map used when no Redis URL is configured, and in tests.
///
/// Runs on tokio's clock, so paused-time tests can step past expiry. Expired
/// entries are dropped when read, and writes sweep the whole map at most once
/// per [`SWEEP_INTERVAL`].
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, "purged expired cache entries");
        }
    }

    fn maybe_sweep(&self) {
        // a concurrent writer is already sweeping
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        let now = Instant::now();
        if now.duration_since(*last) >= SWEEP_INTERVAL {
            *last = now;
            drop(last);
            self.purge_expired();
        }
    }
}

fn deadline_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live() {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live());
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.maybe_sweep();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: deadline_after(ttl),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn cache_key_is_deterministic() {
        assert_eq!(make_cache_key("The cat sat."), make_cache_key("The cat sat."));
    }

    #[test]
    fn cache_key_differs_for_different_text() {
        assert_ne!(make_cache_key("The cat sat."), make_cache_key("The cat sat"));
        assert_ne!(make_cache_key(""), make_cache_key(" "));
    }

    #[test]
    fn cache_key_is_prefixed_sha256() {
        // sha256("") is a published test vector
        assert_eq!(
            make_cache_key(""),
            "analysis:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            make_cache_key("abc"),
            "analysis:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn entries_are_stored_as_json_strings() {
        let raw = r#"{"readability":"5.0"}"#;
        let stored = encode_entry(raw).unwrap();
        assert_eq!(stored, r#""{\"readability\":\"5.0\"}""#);
        assert_eq!(decode_entry(&stored).unwrap(), raw);
    }

    #[test]
    fn decode_rejects_non_string_payloads() {
        assert!(matches!(decode_entry("not json"), Err(CacheError::Serialization(_))));
        // valid JSON but not a string literal
        assert!(matches!(decode_entry(r#"{"a":1}"#), Err(CacheError::Serialization(_))));
    }

    // Minimal RESP server: GET/SETEX against a map, +OK for anything else
    // (client handshake), counting accepted connections.
    async fn spawn_fake_redis() -> (String, Arc<AtomicUsize>, Arc<DashMap<String, (String, String)>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let data = Arc::new(DashMap::new());

        let (counter, map) = (accepted.clone(), data.clone());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let map = map.clone();
                tokio::spawn(async move {
                    let _ = serve_resp(socket, map).await;
                });
            }
        });

        (format!("redis://{addr}"), accepted, data)
    }

    async fn serve_resp(
        socket: TcpStream,
        data: Arc<DashMap<String, (String, String)>>,
    ) -> std::io::Result<()> {
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            let argc: usize = line.trim_end().trim_start_matches('*').parse().unwrap_or(0);
            let mut args = Vec::with_capacity(argc);
            for _ in 0..argc {
                line.clear();
                reader.read_line(&mut line).await?;
                let len: usize = line.trim_end().trim_start_matches('$').parse().unwrap_or(0);
                let mut buf = vec![0; len + 2];
                reader.read_exact(&mut buf).await?;
                buf.truncate(len);
                args.push(String::from_utf8_lossy(&buf).into_owned());
            }

            let command = args.first().map(|c| c.to_ascii_uppercase());
            let reply = match command.as_deref() {
                Some("GET") => match data.get(&args[1]) {
                    Some(entry) => format!("${}\r\n{}\r\n", entry.0.len(), entry.0),
                    None => "$-1\r\n".to_string(),
                },
                Some("SETEX") => {
                    data.insert(args[1].clone(), (args[3].clone(), args[2].clone()));
                    "+OK\r\n".to_string()
                }
                _ => "+OK\r\n".to_string(),
            };
            write.write_all(reply.as_bytes()).await?;
        }
    }

    #[tokio::test]
    async fn redis_store_round_trips_over_one_connection() {
        let (url, accepted, data) = spawn_fake_redis().await;
        let store = RedisStore::new(&url).unwrap();
        let stored = encode_entry("{\"adverbs\":[]}").unwrap();

        assert_eq!(store.get("analysis:k").await.unwrap(), None);
        store.set("analysis:k", &stored, DAY).await.unwrap();
        assert_eq!(store.get("analysis:k").await.unwrap(), Some(stored.clone()));

        // clones share the same handle
        let other = store.clone();
        other.set("analysis:k2", "\"x\"", Duration::ZERO).await.unwrap();

        assert_eq!(data.get("analysis:k").unwrap().1, "86400");
        // zero TTL is raised to the SETEX minimum
        assert_eq!(data.get("analysis:k2").unwrap().1, "1");
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_redis_is_backend_error() {
        let store = RedisStore::new("redis://127.0.0.1:9").unwrap();
        assert!(matches!(store.get("k").await, Err(CacheError::Backend(_))));
        assert!(matches!(store.set("k", "v", DAY).await, Err(CacheError::Backend(_))));
    }

    #[test]
    fn redis_store_rejects_bad_url() {
        assert!(matches!(RedisStore::new("not a url"), Err(CacheError::Backend(_))));
        assert!(RedisStore::new("redis://127.0.0.1:6379").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn memory_entry_expires_after_ttl() {
        let store = MemoryStore::new();
        store.set("k", "v", DAY).await.unwrap();

        tokio::time::advance(DAY - Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn memory_set_is_last_writer_wins() {
        let store = MemoryStore::new();
        store.set("k", "first", DAY).await.unwrap();
        store.set("k", "second", DAY).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_sweep_expired_entries() {
        let store = MemoryStore::new();
        for i in 0..1000 {
            store.set(&format!("k{i}"), "v", Duration::from_secs(1)).await.unwrap();
        }
        assert_eq!(store.len(), 1000);

        tokio::time::advance(DAY).await;
        store.set("fresh", "v", DAY).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fresh").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_live_entries() {
        let store = MemoryStore::new();
        store.set("short", "v", Duration::from_secs(1)).await.unwrap();
        store.set("long", "v", DAY).await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        store.purge_expired();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn huge_ttl_does_not_overflow() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::MAX).await.unwrap();
        store
            .set("k2", "v", Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("k2").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn memory_miss_returns_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }
}
