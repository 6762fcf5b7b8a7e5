//! Classification of MSVC command lines
//!
//! Only single-source compile-only invocations are cacheable. Everything
//! else is reported with the reason it has to go to the real compiler.

use std::path::{Path, PathBuf};

use super::statistics::PassThrough;

/// Extensions treated as C/C++ translation units
const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++"];

/// Switches whose value may be given as the next argument
const SEPARATE_VALUE_SWITCHES: &[&str] = &["D", "I", "U", "FI", "AI", "FU"];

/// A cacheable compilation of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    /// Source file as written on the command line
    pub source: String,
    /// Absolute path of the source file
    pub source_path: PathBuf,
    /// Where the compiler writes the object file
    pub object_path: PathBuf,
    /// Arguments that influence the result, without source and output
    pub key_args: Vec<String>,
    /// Arguments that make the compiler print the preprocessed source
    pub preprocess_args: Vec<String>,
    /// `/Tc` or `/Tp` when the source language was forced
    pub language: Option<String>,
}

/// Split a switch into its name, or `None` for plain arguments
fn switch_name(arg: &str) -> Option<&str> {
    arg.strip_prefix('/').or_else(|| arg.strip_prefix('-'))
}

fn has_source_extension(arg: &str) -> bool {
    Path::new(arg)
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Whether a token is a source file rather than a switch
///
/// Absolute POSIX paths start with `/` just like MSVC switches, so a token
/// with a source extension that names an existing file wins over the switch
/// reading.
fn is_source_file(arg: &str, working_dir: &Path) -> bool {
    if !has_source_extension(arg) {
        return false;
    }
    switch_name(arg).is_none() || working_dir.join(arg).is_file()
}

fn object_path_for(source: &str, output: Option<&str>, working_dir: &Path) -> PathBuf {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let default_name = format!("{}.obj", stem);

    match output {
        None => working_dir.join(default_name),
        Some(out) => {
            let out_path = working_dir.join(out);
            if out.ends_with('/') || out.ends_with('\\') || out_path.is_dir() {
                out_path.join(default_name)
            } else if out_path.extension().is_none() {
                out_path.with_extension("obj")
            } else {
                out_path
            }
        }
    }
}

/// Classify a compiler command line
pub fn analyze_command_line(
    args: &[String],
    working_dir: &Path,
) -> Result<CompileJob, PassThrough> {
    let mut compile_only = false;
    let mut linking = false;
    let mut preprocessing = false;
    let mut external_debug_info = false;
    let mut pch = false;
    let mut output: Option<String> = None;
    let mut sources: Vec<(String, Option<String>)> = Vec::new();
    let mut key_args: Vec<String> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with('@') {
            return Err(PassThrough::InvalidArgument);
        }

        if is_source_file(arg, working_dir) {
            sources.push((arg.clone(), None));
            continue;
        }

        let Some(name) = switch_name(arg) else {
            key_args.push(arg.clone());
            continue;
        };

        match name {
            "c" => {
                compile_only = true;
                key_args.push(arg.clone());
            }
            "link" => {
                linking = true;
                break;
            }
            "E" | "EP" | "P" => preprocessing = true,
            "Zi" => {
                external_debug_info = true;
                key_args.push(arg.clone());
            }
            _ if name.starts_with("Yc") => pch = true,
            _ if name.starts_with("Fo") => output = Some(name[2..].to_string()),
            _ if name.starts_with("Tc") || name.starts_with("Tp") => {
                let language = arg[..arg.len() - name.len() + 2].to_string();
                let file = &name[2..];
                if file.is_empty() {
                    match iter.next() {
                        Some(next) => sources.push((next.clone(), Some(language))),
                        None => return Err(PassThrough::InvalidArgument),
                    }
                } else {
                    sources.push((file.to_string(), Some(language)));
                }
            }
            _ if SEPARATE_VALUE_SWITCHES.contains(&name) => {
                key_args.push(arg.clone());
                match iter.next() {
                    Some(value) => key_args.push(value.clone()),
                    None => return Err(PassThrough::InvalidArgument),
                }
            }
            _ => key_args.push(arg.clone()),
        }
    }

    if linking || !compile_only {
        return Err(PassThrough::Linking);
    }
    if preprocessing {
        return Err(PassThrough::Preprocessing);
    }
    if external_debug_info {
        return Err(PassThrough::ExternalDebugInfo);
    }
    if pch {
        return Err(PassThrough::Pch);
    }

    let (source, language) = match sources.len() {
        0 => return Err(PassThrough::NoSourceFile),
        1 => sources.remove(0),
        _ => return Err(PassThrough::MultipleSourceFiles),
    };
    if matches!(output.as_deref(), Some("")) {
        return Err(PassThrough::InvalidArgument);
    }

    // The preprocessor must see the source the same way the compiler does.
    let source_arg = match &language {
        Some(switch) => format!("{}{}", switch, source),
        None => source.clone(),
    };
    let preprocess_args = key_args
        .iter()
        .filter(|a| switch_name(a) != Some("c"))
        .cloned()
        .chain(["/EP".to_string(), source_arg])
        .collect();
    key_args.extend(language.iter().cloned());

    Ok(CompileJob {
        source_path: working_dir.join(&source),
        object_path: object_path_for(&source, output.as_deref(), working_dir),
        source,
        key_args,
        preprocess_args,
        language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    fn analyze(tokens: &[&str]) -> Result<CompileJob, PassThrough> {
        analyze_command_line(&args(tokens), Path::new("/work"))
    }

    #[test]
    fn test_empty() {
        assert_eq!(analyze(&[]), Err(PassThrough::Linking));
    }

    #[test]
    fn test_simple() {
        let job = analyze(&["/nologo", "/c", "main.cpp"]).unwrap();
        assert_eq!(job.source, "main.cpp");
        assert_eq!(job.source_path, Path::new("/work/main.cpp"));
        assert_eq!(job.object_path, Path::new("/work/main.obj"));
        assert_eq!(job.key_args, args(&["/nologo", "/c"]));
        assert_eq!(job.preprocess_args, args(&["/nologo", "/EP", "main.cpp"]));
    }

    #[test]
    fn test_dash_switches() {
        let job = analyze(&["-nologo", "-c", "-W4", "util.cc"]).unwrap();
        assert_eq!(job.source, "util.cc");
        assert_eq!(job.preprocess_args, args(&["-nologo", "-W4", "/EP", "util.cc"]));
    }

    #[test]
    fn test_no_source() {
        assert_eq!(analyze(&["/c"]), Err(PassThrough::NoSourceFile));
        assert_eq!(analyze(&["/c", "/nologo"]), Err(PassThrough::NoSourceFile));
    }

    #[test]
    fn test_multiple_sources() {
        assert_eq!(
            analyze(&["/c", "a.cpp", "b.cpp"]),
            Err(PassThrough::MultipleSourceFiles)
        );
        assert_eq!(
            analyze(&["/c", "a.cpp", "/Tcb.c"]),
            Err(PassThrough::MultipleSourceFiles)
        );
    }

    #[test]
    fn test_link() {
        assert_eq!(analyze(&["main.cpp"]), Err(PassThrough::Linking));
        assert_eq!(
            analyze(&["/c", "main.cpp", "/link", "/DEBUG"]),
            Err(PassThrough::Linking)
        );
    }

    #[test]
    fn test_preprocessing() {
        for switch in ["/E", "/EP", "/P", "-E"] {
            assert_eq!(
                analyze(&["/c", switch, "main.cpp"]),
                Err(PassThrough::Preprocessing)
            );
        }
    }

    #[test]
    fn test_debug_info_and_pch() {
        assert_eq!(
            analyze(&["/c", "/Zi", "main.cpp"]),
            Err(PassThrough::ExternalDebugInfo)
        );
        assert_eq!(
            analyze(&["/c", "/Ycstdafx.h", "stdafx.cpp"]),
            Err(PassThrough::Pch)
        );
        // Embedded debug info is cacheable.
        assert!(analyze(&["/c", "/Z7", "main.cpp"]).is_ok());
    }

    #[test]
    fn test_response_file() {
        assert_eq!(
            analyze(&["/c", "@args.rsp"]),
            Err(PassThrough::InvalidArgument)
        );
    }

    #[test]
    fn test_output_file() {
        let job = analyze(&["/c", "main.cpp", "/Foout/main_x.obj"]).unwrap();
        assert_eq!(job.object_path, Path::new("/work/out/main_x.obj"));
        assert!(!job.key_args.iter().any(|a| a.starts_with("/Fo")));

        let job = analyze(&["/c", "main.cpp", "/Foobjs\\"]).unwrap();
        assert_eq!(job.object_path, Path::new("/work/objs\\").join("main.obj"));

        let job = analyze(&["/c", "main.cpp", "/Fomain_x"]).unwrap();
        assert_eq!(job.object_path, Path::new("/work/main_x.obj"));

        assert_eq!(
            analyze(&["/c", "main.cpp", "/Fo"]),
            Err(PassThrough::InvalidArgument)
        );
    }

    #[test]
    fn test_tp_tc() {
        let job = analyze(&["/c", "/Tpfoo.h"]).unwrap();
        assert_eq!(job.source, "foo.h");
        assert_eq!(job.object_path, Path::new("/work/foo.obj"));
        assert_eq!(job.language.as_deref(), Some("/Tp"));
        assert_eq!(job.key_args, args(&["/c", "/Tp"]));
        assert_eq!(job.preprocess_args, args(&["/EP", "/Tpfoo.h"]));

        let job = analyze(&["/c", "/Tc", "bar.inc"]).unwrap();
        assert_eq!(job.source, "bar.inc");
        assert_eq!(job.key_args, args(&["/c", "/Tc"]));
        assert_eq!(job.preprocess_args, args(&["/EP", "/Tcbar.inc"]));

        let job = analyze(&["/c", "/W4", "/Tp", "fib.c"]).unwrap();
        assert_eq!(job.source, "fib.c");
        assert_eq!(job.key_args, args(&["/c", "/W4", "/Tp"]));
        assert_eq!(job.preprocess_args, args(&["/W4", "/EP", "/Tpfib.c"]));

        let job = analyze(&["-c", "-Tcfib.c"]).unwrap();
        assert_eq!(job.language.as_deref(), Some("-Tc"));
        assert_eq!(job.preprocess_args, args(&["/EP", "-Tcfib.c"]));
    }

    #[test]
    fn test_forced_language_changes_key_args() {
        let as_c = analyze(&["/c", "/Tcfib.c"]).unwrap();
        let as_cpp = analyze(&["/c", "/Tpfib.c"]).unwrap();
        let plain = analyze(&["/c", "fib.c"]).unwrap();
        assert_eq!(as_c.source, as_cpp.source);
        assert_ne!(as_c.key_args, as_cpp.key_args);
        assert_ne!(as_c.key_args, plain.key_args);
        assert_eq!(plain.language, None);
    }

    #[test]
    fn test_separate_values() {
        let job = analyze(&["/c", "/I", "include", "/D", "NDEBUG", "main.c"]).unwrap();
        assert_eq!(
            job.key_args,
            args(&["/c", "/I", "include", "/D", "NDEBUG"])
        );
        assert_eq!(analyze(&["/c", "main.c", "/I"]), Err(PassThrough::InvalidArgument));
    }

    #[test]
    fn test_absolute_posix_source_path() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("fibonacci.cpp");
        std::fs::write(&source, "int main() {}").unwrap();
        let source = source.to_string_lossy().into_owned();

        let job = analyze_command_line(&args(&["/c", &source]), temp.path()).unwrap();
        assert_eq!(job.source, source);
        assert_eq!(job.object_path, temp.path().join("fibonacci.obj"));
    }
}
