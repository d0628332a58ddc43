//! Process-wide prediction cache.
//! Sharded `RwLock` maps for concurrent reads; striped compute locks so identical
//! fingerprints are computed at most once at a time. Entries expire after an optional
//! TTL and each shard evicts its oldest insert when full.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use xxhash_rust::xxh3::{xxh3_128, xxh3_64};

use crate::config::ExecConfig;
use crate::result_set::{Record, Value};

#[derive(Clone)]
struct Entry {
    rows: Arc<Vec<Record>>,
    inserted: Instant,
}

struct Shard { map: RwLock<HashMap<String, Entry>> }

pub struct PredictCache {
    shards: Vec<Shard>,
    compute_locks: Vec<Mutex<()>>, // striped per key
    per_shard: usize,
    ttl: Option<Duration>,
}

const N_SHARDS: usize = 64;
const N_LOCKS: usize = 256;

static GLOBAL: OnceCell<Arc<PredictCache>> = OnceCell::new();

impl Default for PredictCache {
    fn default() -> Self { Self::new(ExecConfig::default().cache_max_entries, None) }
}

impl PredictCache {
    /// Shared instance sized from `CONFLUX_*` settings on first use.
    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(|| {
            let cfg = ExecConfig::from_env();
            Arc::new(Self::new(cfg.cache_max_entries, cfg.cache_ttl_secs.map(Duration::from_secs)))
        }).clone()
    }

    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        let max_entries = max_entries.max(1);
        let n = max_entries.min(N_SHARDS);
        let mut shards = Vec::with_capacity(n);
        for _ in 0..n { shards.push(Shard { map: RwLock::new(HashMap::new()) }); }
        let mut compute_locks = Vec::with_capacity(N_LOCKS);
        for _ in 0..N_LOCKS { compute_locks.push(Mutex::new(())); }
        Self { shards, compute_locks, per_shard: max_entries.div_ceil(n), ttl }
    }

    #[inline]
    fn shard_idx(&self, key: &str) -> usize { (xxh3_64(key.as_bytes()) as usize) % self.shards.len() }
    #[inline]
    fn lock_idx(key: &str) -> usize { (xxh3_64(key.as_bytes()) as usize) & (N_LOCKS - 1) }

    fn expired(&self, e: &Entry) -> bool {
        self.ttl.is_some_and(|ttl| e.inserted.elapsed() >= ttl)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<Record>>> {
        let shard = &self.shards[self.shard_idx(key)];
        let hit = shard.map.read().get(key).cloned();
        match hit {
            Some(e) if self.expired(&e) => {
                shard.map.write().remove(key);
                None
            }
            Some(e) => Some(e.rows),
            None => None,
        }
    }

    /// Last writer wins.
    pub fn set(&self, key: &str, rows: Vec<Record>) -> Arc<Vec<Record>> {
        let rows = Arc::new(rows);
        let shard = &self.shards[self.shard_idx(key)];
        let mut w = shard.map.write();
        if !w.contains_key(key) && w.len() >= self.per_shard {
            if let Some(oldest) = w.iter().min_by_key(|(_, e)| e.inserted).map(|(k, _)| k.clone()) {
                debug!(target: "conflux::cache", "evicting {}", oldest);
                w.remove(&oldest);
            }
        }
        w.insert(key.to_string(), Entry { rows: rows.clone(), inserted: Instant::now() });
        rows
    }

    /// Cached rows for `key`, or compute them under the key's stripe lock. The flag is
    /// true on a hit.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> Result<(Arc<Vec<Record>>, bool)>
    where
        F: FnOnce() -> Result<Vec<Record>>,
    {
        if let Some(rows) = self.get(key) { return Ok((rows, true)); }
        let _g = self.compute_locks[Self::lock_idx(key)].lock();
        // Recheck after acquiring lock
        if let Some(rows) = self.get(key) { return Ok((rows, true)); }
        let rows = compute()?;
        Ok((self.set(key, rows), false))
    }

    pub fn len(&self) -> usize { self.shards.iter().map(|s| s.map.read().len()).sum() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Drop everything. Returns removed count.
    pub fn invalidate_all(&self) -> usize {
        let mut total = 0;
        for sh in &self.shards {
            let mut w = sh.map.write();
            total += w.len();
            w.clear();
        }
        total
    }
}

/// Deterministic content hash of a row batch: field order inside a row does not
/// matter, row order does.
pub fn fingerprint(rows: &[Record]) -> String {
    let mut buf = String::new();
    for r in rows {
        let sorted: BTreeMap<&str, &Value> = r.iter().collect();
        // Serializing plain values into a string cannot fail.
        buf.push_str(&serde_json::to_string(&sorted).unwrap_or_default());
        buf.push('\n');
    }
    format!("{:032x}", xxh3_128(buf.as_bytes()))
}

/// `{model}_{id}_{version|active}_{fingerprint}`.
pub fn predict_cache_key(model: &str, model_id: i64, version: Option<u32>, rows: &[Record]) -> String {
    let version = version.map(|v| v.to_string()).unwrap_or_else(|| "active".to_string());
    format!("{}_{}_{}_{}", model, model_id, version, fingerprint(rows))
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
