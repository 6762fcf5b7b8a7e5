//! Aggregate `clcache-*.prof` files found below the current directory

use anyhow::{Context, Result};

use clcache::profile::{find_profile_files, render_summary, ProfileReport};
use clcache::utils::terminal::{print_error, print_warning};

fn run() -> Result<()> {
    let root = std::env::current_dir().context("Failed to get current directory")?;

    let mut reports = Vec::new();
    for path in find_profile_files(&root)? {
        println!("Reading {}...", path.display());
        match ProfileReport::load(&path) {
            Ok(report) => reports.push(report),
            Err(err) => print_warning(&format!("{:#}", err)),
        }
    }

    if reports.is_empty() {
        println!("No profile data found.");
        return Ok(());
    }

    print!("{}", render_summary(&reports));
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
