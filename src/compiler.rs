//! Locating the real compiler executable
//!
//! Lookup order: the path given on the command line, then `CLCACHE_CL`, then
//! `cl.exe` on `PATH`. Only existence is checked; whether the file is runnable
//! is left to the operating system when it is spawned.

use std::path::{Path, PathBuf};

use crate::error::ClcacheError;
use crate::settings::Settings;

/// Executable searched on `PATH` when nothing else names a compiler
pub const DEFAULT_COMPILER: &str = "cl.exe";

/// Resolve the compiler for a compile dispatch
pub fn resolve_compiler(
    explicit: Option<&str>,
    settings: &Settings,
) -> Result<PathBuf, ClcacheError> {
    let candidate = match explicit {
        Some(path) => Some(settings.working_dir.join(path)),
        None => find_compiler_binary(settings),
    };

    match candidate {
        Some(path) if path.exists() => Ok(path),
        Some(path) => Err(ClcacheError::compiler_not_found(Some(
            explicit
                .map(str::to_string)
                .unwrap_or_else(|| path.display().to_string()),
        ))),
        None => Err(ClcacheError::compiler_not_found(None)),
    }
}

/// Find the compiler when none was given on the command line
///
/// A set `CLCACHE_CL` is authoritative: if it does not point at an existing
/// file the search stops there instead of falling back to `PATH`.
pub fn find_compiler_binary(settings: &Settings) -> Option<PathBuf> {
    if let Some(override_path) = &settings.compiler_override {
        let path = Path::new(override_path);
        let resolved = if is_bare_name(path) {
            which::which_in(path, settings.search_path.as_ref(), &settings.working_dir).ok()?
        } else {
            settings.working_dir.join(path)
        };
        return resolved.exists().then_some(resolved);
    }

    search_path_for(DEFAULT_COMPILER, settings)
}

/// Search every `PATH` entry for `name`, skipping this executable itself
fn search_path_for(name: &str, settings: &Settings) -> Option<PathBuf> {
    let search_path = settings.search_path.as_ref()?;

    std::env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .filter(|path| path.exists())
        .find(|path| !is_same_file(path, settings.current_exe.as_deref()))
}

fn is_bare_name(path: &Path) -> bool {
    path.parent().map_or(true, |p| p.as_os_str().is_empty())
}

fn is_same_file(path: &Path, current_exe: Option<&Path>) -> bool {
    let Some(current_exe) = current_exe else {
        return false;
    };

    match (path.canonicalize(), current_exe.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            working_dir: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    fn path_of(dirs: &[&Path]) -> Option<OsString> {
        Some(std::env::join_paths(dirs).unwrap())
    }

    #[test]
    fn test_explicit_compiler_must_exist() {
        let temp = tempfile::tempdir().unwrap();
        let settings = settings_in(temp.path());

        let err = resolve_compiler(Some("missing.exe"), &settings).unwrap_err();
        assert!(matches!(
            err,
            ClcacheError::CompilerNotFound { candidate: Some(ref c), .. } if c == "missing.exe"
        ));

        touch(&temp.path().join("present.exe"));
        let path = resolve_compiler(Some("present.exe"), &settings).unwrap();
        assert_eq!(path, temp.path().join("present.exe"));
    }

    #[test]
    fn test_explicit_compiler_wins_over_environment() {
        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        touch(&bin.join("cl.exe"));
        touch(&temp.path().join("other.exe"));
        touch(&temp.path().join("explicit.exe"));

        let settings = Settings {
            compiler_override: Some(temp.path().join("other.exe").display().to_string()),
            search_path: path_of(&[&bin]),
            ..settings_in(temp.path())
        };

        let path = resolve_compiler(Some("explicit.exe"), &settings).unwrap();
        assert_eq!(path, temp.path().join("explicit.exe"));
    }

    #[test]
    fn test_path_search_without_override() {
        let temp = tempfile::tempdir().unwrap();
        let empty = temp.path().join("empty");
        let bin = temp.path().join("bin");
        fs::create_dir_all(&empty).unwrap();
        touch(&bin.join(DEFAULT_COMPILER));

        let settings = Settings {
            search_path: path_of(&[&empty, &bin]),
            ..settings_in(temp.path())
        };

        assert_eq!(
            resolve_compiler(None, &settings).unwrap(),
            bin.join(DEFAULT_COMPILER)
        );
    }

    #[test]
    fn test_override_wins_over_path() {
        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        touch(&bin.join(DEFAULT_COMPILER));
        let custom = temp.path().join("vc").join("cl.exe");
        touch(&custom);

        let settings = Settings {
            compiler_override: Some(custom.display().to_string()),
            search_path: path_of(&[&bin]),
            ..settings_in(temp.path())
        };

        assert_eq!(resolve_compiler(None, &settings).unwrap(), custom);
    }

    #[test]
    fn test_missing_override_does_not_fall_back() {
        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        touch(&bin.join(DEFAULT_COMPILER));

        let settings = Settings {
            compiler_override: Some(temp.path().join("nope.exe").display().to_string()),
            search_path: path_of(&[&bin]),
            ..settings_in(temp.path())
        };

        assert!(find_compiler_binary(&settings).is_none());
        assert!(resolve_compiler(None, &settings).is_err());
    }

    #[test]
    fn test_nothing_found() {
        let temp = tempfile::tempdir().unwrap();
        let settings = Settings {
            search_path: path_of(&[temp.path()]),
            ..settings_in(temp.path())
        };

        let err = resolve_compiler(None, &settings).unwrap_err();
        assert!(matches!(
            err,
            ClcacheError::CompilerNotFound { candidate: None, .. }
        ));
    }

    #[test]
    fn test_path_search_skips_own_executable() {
        let temp = tempfile::tempdir().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        touch(&first.join(DEFAULT_COMPILER));
        touch(&second.join(DEFAULT_COMPILER));

        let settings = Settings {
            search_path: path_of(&[&first, &second]),
            current_exe: Some(first.join(DEFAULT_COMPILER)),
            ..settings_in(temp.path())
        };

        assert_eq!(
            find_compiler_binary(&settings),
            Some(second.join(DEFAULT_COMPILER))
        );
    }

    #[test]
    fn test_is_bare_name() {
        assert!(is_bare_name(Path::new("cl.exe")));
        assert!(!is_bare_name(Path::new("bin/cl.exe")));
        assert!(!is_bare_name(Path::new("/usr/bin/cl.exe")));
    }
}
