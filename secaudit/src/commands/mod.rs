//! CLI command handlers.
//!
//! Reports go to stdout (or `--output`); progress and summaries go to stderr.

pub mod audit;
pub mod check;
pub mod cleanup;
pub mod products;
pub mod recommend;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Print `content` or write it to `output`.
pub fn write_output(content: &str, output: Option<&Path>, what: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}: {}", what, path.display()))?;
            eprintln!("[OK] {} saved to: {}", what, path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
