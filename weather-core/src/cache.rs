//! Location-key cache: free-text location query → provider-specific key.
//!
//! One instance per provider, owning both the in-memory map and the path of
//! its JSON snapshot. Lifecycle:
//! - [`LocationKeyCache::open`] replays the snapshot into memory. A missing or
//!   corrupt file yields an empty cache.
//! - [`LocationKeyCache::put`] writes through to memory, then re-reads the
//!   snapshot, overlays the new entry and rewrites the file. Write failures are
//!   logged and skipped.
//! - [`LocationKeyCache::get`] only consults memory.
//!
//! The query → key mapping is assumed stable, so everything written through
//! `put` or loaded from disk never expires. Two processes sharing one file can
//! still race and lose one of their writes; the file itself is always replaced
//! atomically and is never observed half-written.

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const CACHE_FILE_NAME: &str = "location_cache.json";

/// How often [`LocationKeyCache::spawn_sweeper`] runs by default.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Lifetime of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Never,
    After(Duration),
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(key: String, expiration: Expiration) -> Self {
        let expires_at = match expiration {
            Expiration::Never => None,
            // A deadline past what `Instant` can represent never arrives.
            Expiration::After(ttl) => Instant::now().checked_add(ttl),
        };
        Self { key, expires_at }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
pub struct LocationKeyCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, Entry>>,
    // Serializes read-merge-write of the snapshot within this instance.
    flush_lock: Mutex<()>,
}

impl LocationKeyCache {
    /// Open the cache backed by `path`, loading whatever snapshot is there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let snapshot = read_snapshot(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "Ignoring unreadable location cache");
            BTreeMap::new()
        });

        let entries = snapshot
            .into_iter()
            .map(|(query, key)| (query, Entry::new(key, Expiration::Never)))
            .collect::<HashMap<_, _>>();

        debug!(path = %path.display(), entries = entries.len(), "Loaded location cache");

        Self {
            path,
            entries: RwLock::new(entries),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Memory-only lookup. Expired entries are treated as absent.
    pub fn get(&self, query: &str) -> Option<String> {
        let entries = self.entries.read();
        entries
            .get(query)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.key.clone())
    }

    /// Record `query → key` in memory and persist it to the snapshot file.
    pub fn put(&self, query: &str, key: &str) {
        self.insert(query, key, Expiration::Never);

        if let Err(err) = self.flush_entry(query, key) {
            warn!(
                path = %self.path.display(),
                error = %format!("{err:#}"),
                "Skipping location cache write"
            );
        }
    }

    /// Memory-only insert with an explicit lifetime.
    pub fn insert(&self, query: &str, key: &str, expiration: Expiration) {
        self.entries.write().insert(query.to_string(), Entry::new(key.to_string(), expiration));
    }

    /// Number of entries held in memory, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop memory entries whose finite lifetime has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Run [`purge_expired`](Self::purge_expired) every `every` on the tokio runtime.
    ///
    /// The task holds a weak reference and ends once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else { break };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, "Purged expired location cache entries");
                }
            }
        })
    }

    fn flush_entry(&self, query: &str, key: &str) -> Result<()> {
        let _guard = self.flush_lock.lock();

        // Another process may have written entries we never loaded.
        let mut snapshot = read_snapshot(&self.path).unwrap_or_else(|err| {
            warn!(
                path = %self.path.display(),
                error = %err,
                "Overwriting unreadable location cache"
            );
            BTreeMap::new()
        });
        snapshot.insert(query.to_string(), key.to_string());

        write_snapshot(&self.path, &snapshot)
    }
}

fn read_snapshot(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read location cache: {}", path.display()));
        }
    };

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse location cache: {}", path.display()))
}

fn write_snapshot(path: &Path, snapshot: &BTreeMap<String, String>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    serde_json::to_writer_pretty(&mut tmp, snapshot)
        .context("Failed to serialize location cache")?;
    tmp.flush().context("Failed to flush location cache")?;

    tmp.persist(path)
        .with_context(|| format!("Failed to replace location cache: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> LocationKeyCache {
        LocationKeyCache::open(dir.path().join("amap").join(CACHE_FILE_NAME))
    }

    fn disk_entries(cache: &LocationKeyCache) -> BTreeMap<String, String> {
        let raw = fs::read_to_string(cache.path()).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn put_then_get_returns_key() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        assert_eq!(cache.get("北京"), None);
        cache.put("北京", "110000");
        cache.put("Shanghai", "310000");

        assert_eq!(cache.get("北京").as_deref(), Some("110000"));
        assert_eq!(cache.get("Shanghai").as_deref(), Some("310000"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn last_write_wins_for_same_query() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("london", "328328");
        cache.put("london", "2532685");

        assert_eq!(cache.get("london").as_deref(), Some("2532685"));
        assert_eq!(disk_entries(&cache)["london"], "2532685");
    }

    #[test]
    fn snapshot_is_replayed_on_open() {
        let dir = TempDir::new().unwrap();
        cache_in(&dir).put("Paris", "623");

        let reopened = cache_in(&dir);
        assert_eq!(reopened.get("Paris").as_deref(), Some("623"));
    }

    #[test]
    fn repeated_put_leaves_identical_file() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("Berlin", "178087");
        let first = fs::read(cache.path()).unwrap();
        cache.put("Berlin", "178087");
        let second = fs::read(cache.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn put_merges_entries_written_by_other_instances() {
        let dir = TempDir::new().unwrap();
        let a = cache_in(&dir);
        let b = cache_in(&dir);

        a.put("Tokyo", "226396");
        b.put("Osaka", "225007");

        let on_disk = disk_entries(&b);
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk["Tokyo"], "226396");
        assert_eq!(on_disk["Osaka"], "225007");

        // Memory is not refreshed from disk after open.
        assert_eq!(b.get("Tokyo"), None);
    }

    #[test]
    fn get_does_not_fall_back_to_disk() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        fs::write(cache.path(), r#"{"Rome":"213490"}"#).unwrap();

        assert_eq!(cache.get("Rome"), None);
    }

    #[test]
    fn corrupt_snapshot_is_treated_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);
        fs::write(&path, "{not json").unwrap();

        let cache = LocationKeyCache::open(&path);
        assert!(cache.is_empty());

        cache.put("Madrid", "308526");
        assert_eq!(cache.get("Madrid").as_deref(), Some("308526"));
        let on_disk: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 1);
    }

    #[test]
    fn write_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        // A regular file where the cache directory should be.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "").unwrap();

        let cache = LocationKeyCache::open(blocker.join(CACHE_FILE_NAME));
        cache.put("Oslo", "254946");

        assert_eq!(cache.get("Oslo").as_deref(), Some("254946"));
        assert!(!cache.path().exists());
    }

    #[test]
    fn concurrent_writers_leave_one_of_the_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE_NAME);

        let handles: Vec<_> = ["111", "222"]
            .into_iter()
            .map(|key| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let cache = LocationKeyCache::open(path);
                    for _ in 0..20 {
                        cache.put("Lisbon", key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let on_disk: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let winner = on_disk.get("Lisbon").map(String::as_str);
        assert!(matches!(winner, Some("111") | Some("222")), "got {winner:?}");
    }

    #[test]
    fn purge_only_removes_finite_entries() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("Cairo", "127164");
        cache.insert("temp", "1", Expiration::After(Duration::ZERO));

        assert_eq!(cache.get("temp"), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.get("Cairo").as_deref(), Some("127164"));
    }

    #[test]
    fn unrepresentable_ttl_never_expires() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.insert("forever", "1", Expiration::After(Duration::MAX));

        assert_eq!(cache.get("forever").as_deref(), Some("1"));
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn sweeper_purges_and_stops_when_cache_dropped() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(cache_in(&dir));
        cache.insert("short", "1", Expiration::After(Duration::from_millis(5)));
        cache.insert("long", "2", Expiration::Never);

        let handle = cache.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.len(), 1);

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
