//! Invocation profiling
//!
//! With `CLCACHE_PROFILE` set, every invocation records how long each phase
//! took and leaves a `clcache-<hash>.prof` file in the working directory.
//! `clcache-profile-report` later aggregates all of them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::utils::hash::string_hash;

/// File name pattern of profile reports
pub const PROFILE_FILE_PATTERN: &str = "clcache-*.prof";

/// Timing of one named phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub name: String,
    pub duration_secs: f64,
}

/// Profile of a single invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub timestamp: DateTime<Local>,
    pub invocation_hash: String,
    pub arguments: Vec<String>,
    pub exit_code: i32,
    pub total_secs: f64,
    pub phases: Vec<PhaseTiming>,
}

impl ProfileReport {
    /// Load a report from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile {}", path.display()))
    }

    /// Save the report as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write profile {}", path.display()))
    }
}

/// Name of the profile file for a command line
pub fn profile_file_name(argv: &[String]) -> String {
    format!("clcache-{}.prof", string_hash(&argv.join(",")))
}

/// Phase timer for one invocation
///
/// A disabled profiler still runs every phase but records nothing and
/// writes no file.
pub struct Profiler {
    enabled: bool,
    start_time: Instant,
    phases: Vec<(String, Duration)>,
}

impl Profiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            start_time: Instant::now(),
            phases: Vec::new(),
        }
    }

    /// Run `f` as the phase `name`
    pub fn phase<T>(&mut self, name: &str, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }
        let started = Instant::now();
        let value = f();
        self.phases.push((name.to_string(), started.elapsed()));
        value
    }

    /// Build the report without writing it
    pub fn report(&self, argv: &[String], exit_code: i32) -> ProfileReport {
        ProfileReport {
            timestamp: Local::now(),
            invocation_hash: string_hash(&argv.join(",")),
            arguments: argv.to_vec(),
            exit_code,
            total_secs: self.start_time.elapsed().as_secs_f64(),
            phases: self
                .phases
                .iter()
                .map(|(name, duration)| PhaseTiming {
                    name: name.clone(),
                    duration_secs: duration.as_secs_f64(),
                })
                .collect(),
        }
    }

    /// Write the report into `dir`, returning its path when enabled
    pub fn finish(self, argv: &[String], exit_code: i32, dir: &Path) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = dir.join(profile_file_name(argv));
        self.report(argv, exit_code).save(&path)?;
        Ok(Some(path))
    }
}

/// Every profile file below `root`, in a stable order
pub fn find_profile_files(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(PROFILE_FILE_PATTERN)?;
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| pattern.matches(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// Aggregated timing of one phase across many reports
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSummary {
    pub name: String,
    pub calls: usize,
    pub cumulative_secs: f64,
}

impl PhaseSummary {
    pub fn mean_secs(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.cumulative_secs / self.calls as f64
        }
    }
}

/// Sum phases by name, most expensive first
pub fn aggregate(reports: &[ProfileReport]) -> Vec<PhaseSummary> {
    let mut by_name: HashMap<&str, PhaseSummary> = HashMap::new();
    for phase in reports.iter().flat_map(|r| r.phases.iter()) {
        let summary = by_name
            .entry(phase.name.as_str())
            .or_insert_with(|| PhaseSummary {
                name: phase.name.clone(),
                calls: 0,
                cumulative_secs: 0.0,
            });
        summary.calls += 1;
        summary.cumulative_secs += phase.duration_secs;
    }

    let mut summaries: Vec<PhaseSummary> = by_name.into_values().collect();
    summaries.sort_by(|a, b| {
        b.cumulative_secs
            .total_cmp(&a.cumulative_secs)
            .then_with(|| a.name.cmp(&b.name))
    });
    summaries
}

/// Render the aggregate as a table
pub fn render_summary(reports: &[ProfileReport]) -> String {
    let summaries = aggregate(reports);
    let total: f64 = reports.iter().map(|r| r.total_secs).sum();

    let mut out = String::new();
    out.push_str(&format!(
        "{} invocations in {:.3}s\n\n",
        reports.len(),
        total
    ));
    out.push_str(&format!(
        "{:>8}  {:>12}  {:>12}  {}\n",
        "ncalls", "cumtime", "percall", "phase"
    ));
    for summary in &summaries {
        out.push_str(&format!(
            "{:>8}  {:>12.6}  {:>12.6}  {}\n",
            summary.calls,
            summary.cumulative_secs,
            summary.mean_secs(),
            summary.name
        ));
    }
    out
}
