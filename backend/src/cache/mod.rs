//! Table cache - memoize parsed tables as bincode files
//!
//! A table read from `foo.csv` is persisted next to it as `foo.bin`. When the
//! `.bin` file exists it is read instead of the CSV and is authoritative until
//! deleted (`tradeflow cache clear`).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LoadError, LoadResult};
use crate::logs::{log_info, log_warning};
use crate::parser::parse_csv_file_auto;

/// Extension of cache files
pub const CACHE_EXTENSION: &str = "bin";

/// Cache path for a CSV path (`dir/name.csv` → `dir/name.bin`)
pub fn cache_path_for(csv_path: &Path) -> PathBuf {
    csv_path.with_extension(CACHE_EXTENSION)
}

/// Read a cached table
pub fn read_cache<T: DeserializeOwned>(path: &Path) -> LoadResult<Vec<T>> {
    let bytes = fs::read(path)?;
    bincode::deserialize(&bytes).map_err(|e| LoadError::Cache {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Persist a table to the cache
pub fn write_cache<T: Serialize>(path: &Path, rows: &[T]) -> LoadResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let bytes = bincode::serialize(rows).map_err(|e| LoadError::Cache {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Return the cached table at `cache_path`, or build it and store it.
///
/// A failure to write the cache is logged and otherwise ignored: the built
/// table is still returned.
pub fn load_or_build<T, E, F>(cache_path: &Path, build: F) -> Result<Vec<T>, E>
where
    T: Serialize + DeserializeOwned,
    E: From<LoadError>,
    F: FnOnce() -> Result<Vec<T>, E>,
{
    if cache_path.exists() {
        log_info(format!("Loading cache: {}", cache_path.display()));
        return Ok(read_cache(cache_path)?);
    }

    let rows = build()?;
    match write_cache(cache_path, &rows) {
        Ok(()) => log_info(format!("Stored cache: {}", cache_path.display())),
        Err(e) => log_warning(format!("Could not store cache {}: {}", cache_path.display(), e)),
    }
    Ok(rows)
}

/// Load a CSV table, preferring its cache.
pub fn load_csv_or_cached<T>(csv_path: &Path) -> LoadResult<Vec<T>>
where
    T: Serialize + DeserializeOwned,
{
    let cache_path = cache_path_for(csv_path);
    if !cache_path.exists() && !csv_path.exists() {
        return Err(LoadError::NotFound(csv_path.to_path_buf()));
    }

    load_or_build(&cache_path, || {
        log_info(format!("Loading CSV: {}", csv_path.display()));
        let parsed = parse_csv_file_auto::<T, _>(csv_path).map_err(|source| LoadError::Csv {
            path: csv_path.to_path_buf(),
            source,
        })?;
        log_info(format!("CSV file loaded successfully with {} records.", parsed.records.len()));
        Ok(parsed.records)
    })
}

/// A cache file on disk
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Lists and clears cache files under a set of directories
pub struct CacheRegistry {
    dirs: Vec<PathBuf>,
}

impl CacheRegistry {
    pub fn new<P: AsRef<Path>>(dirs: impl IntoIterator<Item = P>) -> Self {
        Self {
            dirs: dirs.into_iter().map(|d| d.as_ref().to_path_buf()).collect(),
        }
    }

    /// All cache files, sorted by path
    pub fn list(&self) -> Vec<CacheEntry> {
        let mut entries = Vec::new();
        for dir in &self.dirs {
            let Ok(read) = fs::read_dir(dir) else {
                continue;
            };
            for entry in read.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == CACHE_EXTENSION) {
                    let meta = entry.metadata().ok();
                    entries.push(CacheEntry {
                        size_bytes: meta.as_ref().map(|m| m.len()).unwrap_or(0),
                        modified: meta
                            .and_then(|m| m.modified().ok())
                            .map(DateTime::<Utc>::from),
                        path,
                    });
                }
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.dedup_by(|a, b| a.path == b.path);
        entries
    }

    /// Delete every cache file, returning how many were removed
    pub fn clear(&self) -> Result<usize, std::io::Error> {
        let entries = self.list();
        for entry in &entries {
            fs::remove_file(&entry.path)?;
        }
        Ok(entries.len())
    }
}
