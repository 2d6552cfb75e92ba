//! Build command implementation
//!
//! Drives a full build with the pass-through compiler and writes the
//! packaged extension into the output directory.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use crxforge_graph::{BuildOptions, CopyCompiler, FsReader, Orchestrator};
use std::path::Path;
use std::process::ExitCode;

/// Package metadata flags forwarded into [`BuildOptions`].
#[derive(Debug, Default)]
pub struct PackageArgs {
    /// Fallback extension name.
    pub pkg_name: Option<String>,
    /// Fallback extension version.
    pub pkg_version: Option<String>,
    /// Fallback extension description.
    pub pkg_description: Option<String>,
    /// Public key for a stable extension id.
    pub public_key: Option<String>,
    /// Report derived-permission changes.
    pub verbose: bool,
}

/// Run the build command
///
/// # Returns
/// Exit code: 0 on success, 1 on build failure
pub fn run(manifest_path: &str, outdir: &str, args: PackageArgs, json_output: bool) -> Result<ExitCode> {
    let options = BuildOptions {
        pkg_name: args.pkg_name,
        pkg_version: args.pkg_version,
        pkg_description: args.pkg_description,
        public_key: args.public_key,
        verbose: args.verbose,
        exclude_kinds: Default::default(),
    };

    if !json_output {
        println!("{} {}", "Building:".cyan().bold(), manifest_path);
    }

    let mut orchestrator = Orchestrator::new(options, Box::new(FsReader), CopyCompiler::new());
    if let Err(err) = orchestrator.build(Path::new(manifest_path)) {
        if json_output {
            let output = serde_json::json!({
                "manifest": manifest_path,
                "ok": false,
                "error": err.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("  {} {}", "x".red(), err);
            println!("{}", "Build failed.".red().bold());
        }
        return Ok(ExitCode::FAILURE);
    }

    let bundle = orchestrator
        .bundle()
        .ok_or_else(|| anyhow!("build produced no bundle"))?;
    let graph = orchestrator
        .graph()
        .ok_or_else(|| anyhow!("build produced no graph"))?;

    let out = Path::new(outdir);
    let mut written: Vec<String> = Vec::new();
    for chunk in bundle.chunks() {
        write_output(out, &chunk.file_name, chunk.code.as_bytes())?;
        written.push(chunk.file_name.clone());
    }
    for asset in bundle.assets() {
        write_output(out, &asset.file_name, &asset.source)?;
        written.push(asset.file_name.clone());
    }
    written.sort();

    if json_output {
        let output = serde_json::json!({
            "manifest": manifest_path,
            "ok": true,
            "outdir": outdir,
            "files": written,
            "permissions": orchestrator.derived_permissions(),
            "warnings": graph.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
            "notices": graph.notices,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::SUCCESS);
    }

    for warning in &graph.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
    for notice in &graph.notices {
        println!("  {} {}", "i".blue(), notice);
    }
    for file in &written {
        println!("  {} {}", "+".green(), file);
    }
    println!(
        "{} {} file(s) -> {}",
        "Done.".green().bold(),
        written.len(),
        outdir
    );
    Ok(ExitCode::SUCCESS)
}

fn write_output(outdir: &Path, file_name: &str, contents: &[u8]) -> Result<()> {
    let path = outdir.join(file_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write output file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_an_extension_into_the_outdir() {
        let src = tempfile::tempdir().unwrap();
        let dist = tempfile::tempdir().unwrap();
        std::fs::write(
            src.path().join("manifest.json"),
            r#"{
                "manifest_version": 3,
                "name": "demo", "version": "1.0.0",
                "background": { "service_worker": "sw.js" }
            }"#,
        )
        .unwrap();
        std::fs::write(src.path().join("sw.js"), "chrome.alarms.create('t', {});").unwrap();

        let manifest = src.path().join("manifest.json");
        let code = run(
            manifest.to_str().unwrap(),
            dist.path().to_str().unwrap(),
            PackageArgs::default(),
            true,
        )
        .unwrap();
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));

        let emitted: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dist.path().join("manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(emitted["permissions"], serde_json::json!(["alarms"]));
        assert!(dist.path().join("sw.js").exists());
    }

    #[test]
    fn build_failure_returns_a_nonzero_exit_code() {
        let src = tempfile::tempdir().unwrap();
        let dist = tempfile::tempdir().unwrap();
        std::fs::write(
            src.path().join("manifest.json"),
            r#"{ "manifest_version": 3, "name": "demo", "version": "1.0.0" }"#,
        )
        .unwrap();

        let manifest = src.path().join("manifest.json");
        let code = run(
            manifest.to_str().unwrap(),
            dist.path().to_str().unwrap(),
            PackageArgs::default(),
            true,
        )
        .unwrap();
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));
    }
}
