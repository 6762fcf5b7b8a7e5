//! Directory-backed cache
//!
//! Cache keys are computed in non-direct mode: the compiler is asked for the
//! preprocessed source (`/EP`) and the key hashes that output together with
//! the compiler identity and the relevant flags, so header changes are always
//! picked up.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};

use super::analysis::{analyze_command_line, CompileJob};
use super::configuration::{Configuration, ConfigurationGuard};
use super::lock::CacheLock;
use super::statistics::Statistics;
use super::storage::{CompilerArtifacts, Manifest, ObjectStore};
use super::Cache;
use crate::exec::subprocess::{invoke_real_compiler, run_command, CommandResult};
use crate::settings::Settings;
use crate::trace_statement;
use crate::utils::hash::{bytes_hash, string_hash};

/// Cache stored in a local directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    working_dir: PathBuf,
    disabled: bool,
    store: ObjectStore,
}

impl FileCache {
    /// Open the cache configured by `settings`, creating its directory
    pub fn open(settings: &Settings) -> Result<Self> {
        let dir = settings.resolve_cache_dir()?;
        Self::open_at(&dir, settings)
    }

    /// Open a cache in an explicit directory
    pub fn open_at(dir: &Path, settings: &Settings) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            working_dir: settings.working_dir.clone(),
            disabled: settings.disabled,
            store: ObjectStore::new(dir),
        })
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current persisted statistics
    pub fn statistics(&self) -> Statistics {
        Statistics::load(&self.dir)
    }

    /// Current persisted configuration
    pub fn configuration(&self) -> Configuration {
        Configuration::load(&self.dir)
    }

    /// Mutate the statistics under the cache lock
    fn update_statistics<T>(
        &self,
        update: impl FnOnce(&mut Statistics, &Configuration) -> Result<T>,
    ) -> Result<T> {
        let _lock = CacheLock::acquire(&self.dir)?;
        let configuration = Configuration::load(&self.dir);
        let mut stats = Statistics::load(&self.dir);
        let value = update(&mut stats, &configuration)?;
        stats.save(&self.dir)?;
        Ok(value)
    }

    fn process_compile_job(
        &self,
        compiler: &Path,
        args: &[String],
        job: &CompileJob,
    ) -> Result<i32> {
        let preprocessed = run_command(compiler, &job.preprocess_args, &self.working_dir, false)?;
        if !preprocessed.success() {
            trace_statement!(
                "Preprocessing {} failed, passing to real compiler",
                job.source
            );
            return invoke_real_compiler(compiler, args, &self.working_dir);
        }

        let key = compute_object_key(compiler, job, &preprocessed.stdout)?;
        let manifest_key = compute_manifest_key(compiler, job);
        trace_statement!("Cache key for {} is {}", job.source, key);

        if self.restore_from_cache(&key, job)? {
            self.update_statistics(|stats, _| {
                stats.register_cache_hit();
                Ok(())
            })?;
            return Ok(0);
        }

        let result = run_command(compiler, args, &self.working_dir, false)?;
        replay_output(&result.stdout, &result.stderr)?;

        if result.success() && job.object_path.is_file() {
            self.store_result(&key, &manifest_key, job, &result)?;
        } else {
            trace_statement!("Real compiler failed with {}, nothing cached", result.exit_code);
        }

        Ok(result.exit_code)
    }

    /// Copy a cached object into place; `false` when there is no usable entry
    fn restore_from_cache(&self, key: &str, job: &CompileJob) -> Result<bool> {
        let Some(artifacts) = self.store.get_entry(key)? else {
            return Ok(false);
        };

        if let Some(parent) = job.object_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(e) = fs::copy(&artifacts.object_file, &job.object_path) {
            // Evicted by a concurrent clean between lookup and copy.
            trace_statement!("Cache entry {} vanished: {}", key, e);
            return Ok(false);
        }

        trace_statement!("Cache hit for {}", job.source);
        replay_output(&artifacts.stdout, &artifacts.stderr)?;
        Ok(true)
    }

    fn store_result(
        &self,
        key: &str,
        manifest_key: &str,
        job: &CompileJob,
        result: &CommandResult,
    ) -> Result<()> {
        let source_hash = bytes_hash(
            &fs::read(&job.source_path)
                .with_context(|| format!("Failed to read {}", job.source_path.display()))?,
        );
        let artifacts = CompilerArtifacts {
            object_file: job.object_path.clone(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
        };

        self.update_statistics(|stats, configuration| {
            match self.store.get_manifest(manifest_key) {
                None => stats.register_cache_miss(),
                Some(previous) if previous.object_key == key => stats.register_evicted_miss(),
                Some(previous) if previous.source_hash != source_hash => {
                    stats.register_source_changed_miss()
                }
                Some(_) => stats.register_header_changed_miss(),
            }

            if let Some(size) = self.store.set_entry(key, &artifacts)? {
                stats.cache_entries += 1;
                stats.cache_size += size;
            }
            let manifest_growth = self.store.set_manifest(
                manifest_key,
                &Manifest {
                    source_hash,
                    object_key: key.to_string(),
                },
            )?;
            stats.cache_size = stats.cache_size.saturating_add_signed(manifest_growth);

            if stats.cache_size > configuration.maximum_cache_size {
                self.store.clean(stats, configuration.maximum_cache_size)?;
            }
            Ok(())
        })
    }
}

impl Cache for FileCache {
    type Configuration = ConfigurationGuard;

    fn lock_configuration(&self) -> Result<ConfigurationGuard> {
        ConfigurationGuard::acquire(&self.dir)
    }

    fn print_statistics(&self) -> Result<()> {
        let _lock = CacheLock::acquire(&self.dir)?;
        let configuration = Configuration::load(&self.dir);
        let stats = Statistics::load(&self.dir);
        print!("{}", stats.render(&self.dir, configuration.maximum_cache_size));
        Ok(())
    }

    fn clean(&self) -> Result<()> {
        self.update_statistics(|stats, configuration| {
            self.store.clean(stats, configuration.maximum_cache_size)?;
            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.update_statistics(|stats, _| {
            self.store.clean(stats, 0)?;
            Ok(())
        })
    }

    fn reset_statistics(&self) -> Result<()> {
        self.update_statistics(|stats, _| {
            stats.reset_counters();
            Ok(())
        })
    }

    fn run(&self, compiler: &Path, args: &[String]) -> Result<i32> {
        if self.disabled {
            trace_statement!("Caching disabled, passing to real compiler");
            return invoke_real_compiler(compiler, args, &self.working_dir);
        }

        match analyze_command_line(args, &self.working_dir) {
            Ok(job) => self.process_compile_job(compiler, args, &job),
            Err(reason) => {
                trace_statement!("Cannot cache invocation ({:?}), passing to real compiler", reason);
                self.update_statistics(|stats, _| {
                    stats.register_pass_through(reason);
                    Ok(())
                })?;
                invoke_real_compiler(compiler, args, &self.working_dir)
            }
        }
    }
}

/// Identity of the compiler binary: size and modification time
fn compiler_identity(compiler: &Path) -> Result<String> {
    let metadata = fs::metadata(compiler)
        .with_context(|| format!("Failed to stat compiler {}", compiler.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());
    Ok(format!("{}|{}", metadata.len(), modified))
}

fn compute_object_key(compiler: &Path, job: &CompileJob, preprocessed: &[u8]) -> Result<String> {
    let mut buffer = Vec::with_capacity(preprocessed.len() + 256);
    buffer.extend_from_slice(compiler_identity(compiler)?.as_bytes());
    buffer.push(0);
    buffer.extend_from_slice(job.key_args.join(" ").as_bytes());
    buffer.push(0);
    buffer.extend_from_slice(preprocessed);
    Ok(bytes_hash(&buffer))
}

fn compute_manifest_key(compiler: &Path, job: &CompileJob) -> String {
    string_hash(&format!(
        "{}|{}|{}",
        compiler.display(),
        job.key_args.join(" "),
        job.source_path.display()
    ))
}

fn replay_output(stdout: &[u8], stderr: &[u8]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(stdout)?;
    out.flush()?;
    let mut err = std::io::stderr().lock();
    err.write_all(stderr)?;
    err.flush()?;
    Ok(())
}
