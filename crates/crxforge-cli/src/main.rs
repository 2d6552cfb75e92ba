//! crxforge CLI - package browser extensions from a declarative manifest.

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crxforge_cli::commands;

/// crxforge - Browser Extension Build Pipeline
#[derive(Parser)]
#[command(name = "crxforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a manifest file without building
    Validate {
        /// Path to manifest.json
        #[arg(short, long)]
        manifest: String,

        /// Output machine-readable JSON diagnostics (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// List every file the manifest pulls into a build
    Files {
        /// Path to manifest.json
        #[arg(short, long)]
        manifest: String,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Build the extension package into an output directory
    Build {
        /// Path to manifest.json
        #[arg(short, long)]
        manifest: String,

        /// Output directory for the packaged extension
        #[arg(short, long, default_value = "dist")]
        outdir: String,

        /// Extension name when the manifest omits one
        #[arg(long)]
        pkg_name: Option<String>,

        /// Extension version when the manifest omits one
        #[arg(long)]
        pkg_version: Option<String>,

        /// Extension description when the manifest omits one
        #[arg(long)]
        pkg_description: Option<String>,

        /// Public key injected as `key` for a stable extension id
        #[arg(long)]
        public_key: Option<String>,

        /// Report derived-permission changes as notices
        #[arg(short, long)]
        verbose: bool,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { manifest, json } => commands::validate::run(&manifest, json),
        Commands::Files { manifest, json } => commands::files::run(&manifest, json),
        Commands::Build {
            manifest,
            outdir,
            pkg_name,
            pkg_version,
            pkg_description,
            public_key,
            verbose,
            json,
        } => commands::build::run(
            &manifest,
            &outdir,
            commands::build::PackageArgs {
                pkg_name,
                pkg_version,
                pkg_description,
                public_key,
                verbose,
            },
            json,
        ),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
