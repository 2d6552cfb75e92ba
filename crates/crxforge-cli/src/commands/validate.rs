//! Validate command implementation
//!
//! Parses a manifest file and reports coded errors and warnings.

use anyhow::{Context, Result};
use colored::Colorize;
use crxforge_manifest::{validate_manifest, Manifest};
use std::path::Path;
use std::process::ExitCode;

/// Run the validate command
///
/// # Arguments
/// * `manifest_path` - Path to manifest.json
/// * `json_output` - Whether to output machine-readable JSON diagnostics
///
/// # Returns
/// Exit code: 0 if valid, 1 if invalid
pub fn run(manifest_path: &str, json_output: bool) -> Result<ExitCode> {
    let contents = std::fs::read_to_string(Path::new(manifest_path))
        .with_context(|| format!("Failed to read manifest file: {manifest_path}"))?;
    let manifest = Manifest::parse(&contents)
        .with_context(|| format!("Failed to parse manifest file: {manifest_path}"))?;
    let result = validate_manifest(&manifest);

    if json_output {
        let output = serde_json::json!({
            "manifest": manifest_path,
            "valid": result.is_ok(),
            "errors": result.errors.iter().map(|e| serde_json::json!({
                "code": e.code.code(),
                "message": e.message,
                "path": e.path,
            })).collect::<Vec<_>>(),
            "warnings": result.warnings.iter().map(|w| serde_json::json!({
                "code": w.code.code(),
                "message": w.message,
                "path": w.path,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(if result.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    println!("{} {}", "Validating:".cyan().bold(), manifest_path);

    for warning in &result.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
    for error in &result.errors {
        println!("  {} {}", "x".red(), error);
    }

    if result.is_ok() {
        println!(
            "{} {} warning(s)",
            "Valid.".green().bold(),
            result.warnings.len()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} {} error(s), {} warning(s)",
            "Invalid.".red().bold(),
            result.errors.len(),
            result.warnings.len()
        );
        Ok(ExitCode::FAILURE)
    }
}
