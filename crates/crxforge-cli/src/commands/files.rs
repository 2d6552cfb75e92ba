//! Files command implementation
//!
//! Lists every file the manifest references directly, typed by role.
//! Discovery only: HTML and CSS containers are not opened, so this is the
//! first layer of what a build would pull in.

use anyhow::{Context, Result};
use colored::Colorize;
use crxforge_graph::derive_files;
use crxforge_manifest::Manifest;
use std::path::Path;
use std::process::ExitCode;

/// Run the files command
pub fn run(manifest_path: &str, json_output: bool) -> Result<ExitCode> {
    let path = Path::new(manifest_path);
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest file: {manifest_path}"))?;
    let manifest = Manifest::parse(&contents)
        .with_context(|| format!("Failed to parse manifest file: {manifest_path}"))?;
    let version = manifest.schema_version()?;
    let src_dir = path.parent().unwrap_or(Path::new("."));

    let refs = derive_files(&manifest, src_dir, version);

    if json_output {
        let output = serde_json::json!({
            "manifest": manifest_path,
            "schema_version": version.as_u32(),
            "files": refs.iter().map(|r| serde_json::json!({
                "file": r.file_name,
                "kind": r.kind.as_str(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{} {} ({})",
        "Manifest:".cyan().bold(),
        manifest_path,
        version
    );
    for r in &refs {
        println!("  {:<18} {}", r.kind.as_str().dimmed(), r.file_name);
    }
    println!("{} {} file(s)", "Total:".bold(), refs.len());
    Ok(ExitCode::SUCCESS)
}
