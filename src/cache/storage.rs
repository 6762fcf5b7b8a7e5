//! On-disk layout of cache entries
//!
//! ```text
//! <cache dir>/objects/<first two key chars>/<key>/object
//!                                                /output.txt
//!                                                /stderr.txt
//! <cache dir>/manifests/<first two chars>/<manifest key>.json
//! ```
//!
//! An entry directory is only ever created by renaming a fully written
//! temporary directory into place, so readers never observe partial entries.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::persist;
use super::statistics::Statistics;

const OBJECTS_DIR: &str = "objects";
const MANIFESTS_DIR: &str = "manifests";
const OBJECT_FILE: &str = "object";
const STDOUT_FILE: &str = "output.txt";
const STDERR_FILE: &str = "stderr.txt";
const TEMP_MARKER: &str = ".tmp";

/// Share of the maximum size kept after a clean, so cleans stay infrequent
const CLEAN_TARGET_RATIO: f64 = 0.9;

/// Share of the clean target available to manifests
const MANIFEST_SHARE: f64 = 0.1;

/// Compiler output stored alongside an object file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerArtifacts {
    pub object_file: PathBuf,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Last known result for one source file compiled with one set of flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub source_hash: String,
    pub object_key: String,
}

/// Summary of a clean pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed_entries: u64,
    pub removed_bytes: u64,
}

struct EntryInfo {
    path: PathBuf,
    size: u64,
    last_used: SystemTime,
}

/// Object and manifest storage rooted in a cache directory
#[derive(Debug, Clone)]
pub struct ObjectStore {
    objects_dir: PathBuf,
    manifests_dir: PathBuf,
}

impl ObjectStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            objects_dir: cache_dir.join(OBJECTS_DIR),
            manifests_dir: cache_dir.join(MANIFESTS_DIR),
        }
    }

    /// Directory of the entry for `key`
    pub fn entry_dir(&self, key: &str) -> PathBuf {
        self.objects_dir.join(shard(key)).join(key)
    }

    /// Whether a complete entry exists for `key`
    pub fn has_entry(&self, key: &str) -> bool {
        self.entry_dir(key).join(OBJECT_FILE).is_file()
    }

    /// Read an entry and mark it as recently used
    pub fn get_entry(&self, key: &str) -> Result<Option<CompilerArtifacts>> {
        let dir = self.entry_dir(key);
        let object_file = dir.join(OBJECT_FILE);
        if !object_file.is_file() {
            return Ok(None);
        }

        let stdout = fs::read(dir.join(STDOUT_FILE)).unwrap_or_default();
        let stderr = fs::read(dir.join(STDERR_FILE)).unwrap_or_default();
        touch(&object_file);

        Ok(Some(CompilerArtifacts {
            object_file,
            stdout,
            stderr,
        }))
    }

    /// Store an entry; returns the entry size, or `None` if it already existed
    pub fn set_entry(&self, key: &str, artifacts: &CompilerArtifacts) -> Result<Option<u64>> {
        let final_dir = self.entry_dir(key);
        if final_dir.join(OBJECT_FILE).is_file() {
            return Ok(None);
        }

        let tmp_dir = final_dir.with_file_name(format!(
            "{}{}{}",
            key,
            TEMP_MARKER,
            std::process::id()
        ));
        fs::create_dir_all(&tmp_dir)
            .with_context(|| format!("Failed to create {}", tmp_dir.display()))?;

        fs::copy(&artifacts.object_file, tmp_dir.join(OBJECT_FILE)).with_context(|| {
            format!("Failed to copy {} into cache", artifacts.object_file.display())
        })?;
        fs::write(tmp_dir.join(STDOUT_FILE), &artifacts.stdout)?;
        fs::write(tmp_dir.join(STDERR_FILE), &artifacts.stderr)?;

        if final_dir.exists() {
            // Incomplete leftover of an interrupted store.
            fs::remove_dir_all(&final_dir)?;
        }
        if let Err(e) = fs::rename(&tmp_dir, &final_dir) {
            let _ = fs::remove_dir_all(&tmp_dir);
            return Err(e).with_context(|| format!("Failed to store entry {}", key));
        }

        Ok(Some(dir_size(&final_dir)))
    }

    /// Manifest path for `manifest_key`
    pub fn manifest_path(&self, manifest_key: &str) -> PathBuf {
        self.manifests_dir
            .join(shard(manifest_key))
            .join(format!("{}.json", manifest_key))
    }

    pub fn get_manifest(&self, manifest_key: &str) -> Option<Manifest> {
        let path = self.manifest_path(manifest_key);
        if !path.is_file() {
            return None;
        }
        persist::load_or_default::<Option<Manifest>>(&path)
    }

    /// Write a manifest; returns the change in bytes stored
    pub fn set_manifest(&self, manifest_key: &str, manifest: &Manifest) -> Result<i64> {
        let path = self.manifest_path(manifest_key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let previous = file_size(&path);
        persist::save(&path, manifest)?;
        Ok(file_size(&path) as i64 - previous as i64)
    }

    /// Evict least recently used entries until the cache fits
    ///
    /// Orphaned and half-written entries are always removed. When objects
    /// and manifests together exceed `maximum_size`, they are evicted down
    /// to 90% of it, manifests getting at most a tenth of that budget.
    /// `stats` receives the resulting entry count and size.
    pub fn clean(&self, stats: &mut Statistics, maximum_size: u64) -> Result<CleanReport> {
        let mut report = CleanReport::default();
        let mut entries = Vec::new();

        for entry in self.scan_entries()? {
            if is_complete_entry(&entry) {
                entries.push(EntryInfo {
                    size: dir_size(&entry),
                    last_used: last_used(&entry),
                    path: entry,
                });
            } else {
                report.removed_bytes += dir_size(&entry);
                report.removed_entries += 1;
                remove_entry(&entry)?;
            }
        }

        let mut current_size: u64 = entries.iter().map(|e| e.size).sum();
        let mut remaining = entries.len() as u64;
        let mut manifests = self.scan_manifests()?;
        let mut manifests_size: u64 = manifests.iter().map(|m| m.size).sum();

        if current_size + manifests_size >= maximum_size {
            let overall_target = (maximum_size as f64 * CLEAN_TARGET_RATIO) as u64;
            let manifest_target = (overall_target as f64 * MANIFEST_SHARE) as u64;

            manifests.sort_by_key(|m| m.last_used);
            for manifest in &manifests {
                if manifests_size <= manifest_target {
                    break;
                }
                fs::remove_file(&manifest.path).with_context(|| {
                    format!("Failed to remove manifest {}", manifest.path.display())
                })?;
                manifests_size -= manifest.size;
            }

            let target = overall_target.saturating_sub(manifests_size);
            entries.sort_by_key(|e| e.last_used);

            for entry in &entries {
                if current_size <= target {
                    break;
                }
                remove_entry(&entry.path)?;
                current_size -= entry.size;
                remaining -= 1;
                report.removed_bytes += entry.size;
                report.removed_entries += 1;
            }
        }

        if maximum_size == 0 && self.manifests_dir.exists() {
            fs::remove_dir_all(&self.manifests_dir).with_context(|| {
                format!("Failed to remove {}", self.manifests_dir.display())
            })?;
            manifests_size = 0;
        }

        stats.cache_entries = remaining;
        stats.cache_size = current_size + manifests_size;

        crate::trace_statement!(
            "Cleaned cache: removed {} entries ({} bytes), {} entries left",
            report.removed_entries,
            report.removed_bytes,
            remaining
        );

        Ok(report)
    }

    /// Every directory two levels below `objects/`
    fn scan_entries(&self) -> Result<Vec<PathBuf>> {
        if !self.objects_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.objects_dir).min_depth(2).max_depth(2) {
            let entry = entry.with_context(|| {
                format!("Failed to scan {}", self.objects_dir.display())
            })?;
            if entry.file_type().is_dir() {
                entries.push(entry.into_path());
            }
        }
        Ok(entries)
    }

    /// Every manifest file with its size and age
    fn scan_manifests(&self) -> Result<Vec<EntryInfo>> {
        if !self.manifests_dir.exists() {
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in WalkDir::new(&self.manifests_dir).min_depth(2).max_depth(2) {
            let entry = entry.with_context(|| {
                format!("Failed to scan {}", self.manifests_dir.display())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata()?;
            manifests.push(EntryInfo {
                size: metadata.len(),
                last_used: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path: entry.into_path(),
            });
        }
        Ok(manifests)
    }
}

fn shard(key: &str) -> &str {
    key.get(..2).unwrap_or(key)
}

fn is_complete_entry(path: &Path) -> bool {
    let is_temp = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.contains(TEMP_MARKER));
    !is_temp && path.join(OBJECT_FILE).is_file()
}

fn remove_entry(path: &Path) -> Result<()> {
    fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove cache entry {}", path.display()))
}

fn last_used(entry: &Path) -> SystemTime {
    fs::metadata(entry.join(OBJECT_FILE))
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Refresh the modification time used for LRU eviction
fn touch(path: &Path) {
    let result = OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::now()));
    if let Err(e) = result {
        crate::trace_statement!("Could not touch {}: {}", path.display(), e);
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map_or(0, |m| m.len())
}

/// Total size of all files below `path`
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}
