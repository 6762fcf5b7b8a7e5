//! Persisted cache statistics

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::persist;
use crate::utils::terminal::format_bytes;

/// File name of the statistics inside the cache directory
pub const STATS_FILE: &str = "stats.txt";

/// Hit, miss and pass-through counters shared by every clcache process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Statistics {
    pub calls_with_invalid_argument: u64,
    pub calls_without_source_file: u64,
    pub calls_with_multiple_source_files: u64,
    pub calls_with_pch: u64,
    pub calls_for_linking: u64,
    pub calls_for_external_debug_info: u64,
    pub calls_for_preprocessing: u64,
    pub cache_entries: u64,
    pub cache_size: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evicted_misses: u64,
    pub header_changed_misses: u64,
    pub source_changed_misses: u64,
}

/// Reasons a call is passed straight to the real compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThrough {
    InvalidArgument,
    NoSourceFile,
    MultipleSourceFiles,
    Pch,
    Linking,
    ExternalDebugInfo,
    Preprocessing,
}

impl Statistics {
    /// Statistics file path for a cache directory
    pub fn stats_file(cache_dir: &Path) -> PathBuf {
        cache_dir.join(STATS_FILE)
    }

    /// Load the statistics of a cache directory
    pub fn load(cache_dir: &Path) -> Self {
        persist::load_or_default(&Self::stats_file(cache_dir))
    }

    /// Persist the statistics into a cache directory
    pub fn save(&self, cache_dir: &Path) -> Result<()> {
        persist::save(&Self::stats_file(cache_dir), self)
    }

    pub fn register_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn register_cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn register_evicted_miss(&mut self) {
        self.evicted_misses += 1;
    }

    pub fn register_header_changed_miss(&mut self) {
        self.header_changed_misses += 1;
    }

    pub fn register_source_changed_miss(&mut self) {
        self.source_changed_misses += 1;
    }

    /// Count a call that was handed to the real compiler uncached
    pub fn register_pass_through(&mut self, reason: PassThrough) {
        let counter = match reason {
            PassThrough::InvalidArgument => &mut self.calls_with_invalid_argument,
            PassThrough::NoSourceFile => &mut self.calls_without_source_file,
            PassThrough::MultipleSourceFiles => &mut self.calls_with_multiple_source_files,
            PassThrough::Pch => &mut self.calls_with_pch,
            PassThrough::Linking => &mut self.calls_for_linking,
            PassThrough::ExternalDebugInfo => &mut self.calls_for_external_debug_info,
            PassThrough::Preprocessing => &mut self.calls_for_preprocessing,
        };
        *counter += 1;
    }

    /// All misses, whatever their cause
    pub fn total_cache_misses(&self) -> u64 {
        self.cache_misses
            + self.evicted_misses
            + self.header_changed_misses
            + self.source_changed_misses
    }

    /// Zero every counter; the size bookkeeping is kept
    pub fn reset_counters(&mut self) {
        *self = Self {
            cache_entries: self.cache_entries,
            cache_size: self.cache_size,
            ..Self::default()
        };
    }

    /// Human-readable statistics report
    pub fn render(&self, cache_dir: &Path, maximum_cache_size: u64) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "clcache statistics:");
        let _ = writeln!(out, "  current cache dir         : {}", cache_dir.display());
        let _ = writeln!(out, "  cache size                : {} bytes", format_bytes(self.cache_size));
        let _ = writeln!(out, "  maximum cache size        : {} bytes", format_bytes(maximum_cache_size));
        let _ = writeln!(out, "  cache entries             : {}", self.cache_entries);
        let _ = writeln!(out, "  cache hits                : {}", self.cache_hits);
        let _ = writeln!(out, "  cache misses");
        let _ = writeln!(out, "    total                      : {}", self.total_cache_misses());
        let _ = writeln!(out, "    evicted                    : {}", self.evicted_misses);
        let _ = writeln!(out, "    header changed             : {}", self.header_changed_misses);
        let _ = writeln!(out, "    source changed             : {}", self.source_changed_misses);
        let _ = writeln!(out, "  passed to real compiler");
        let _ = writeln!(out, "    called w/ invalid argument : {}", self.calls_with_invalid_argument);
        let _ = writeln!(out, "    called for preprocessing   : {}", self.calls_for_preprocessing);
        let _ = writeln!(out, "    called for linking         : {}", self.calls_for_linking);
        let _ = writeln!(out, "    called for external debug  : {}", self.calls_for_external_debug_info);
        let _ = writeln!(out, "    called w/o source          : {}", self.calls_without_source_file);
        let _ = writeln!(out, "    called w/ multiple sources : {}", self.calls_with_multiple_source_files);
        let _ = writeln!(out, "    called w/ PCH              : {}", self.calls_with_pch);
        out
    }
}
