//! Build-graph engine for browser-extension packaging.
//!
//! Starting from a `manifest.json`, the engine discovers every file the
//! extension depends on (manifest fields, HTML pages, CSS imports,
//! web-accessible globs), tracks each file through a lifecycle machine,
//! registers inputs with an external [`Compiler`], and derives the final
//! manifest body from the completed bundle: runtime permissions scanned
//! out of compiled code and `web_accessible_resources` scoped per schema
//! version.
//!
//! ```no_run
//! use std::path::Path;
//! use crxforge_graph::{BuildOptions, CopyCompiler, FsReader, Orchestrator};
//!
//! # fn main() -> Result<(), crxforge_graph::GraphError> {
//! let mut orchestrator = Orchestrator::new(
//!     BuildOptions::default(),
//!     Box::new(FsReader),
//!     CopyCompiler::new(),
//! );
//! orchestrator.build(Path::new("extension/manifest.json"))?;
//! let graph = orchestrator.graph().expect("settled graph");
//! println!("{} files discovered", graph.files.len());
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod cache;
pub mod emit;
pub mod error;
pub mod extract;
pub mod file;
pub mod machine;
pub mod orchestrator;
pub mod resources;

pub use bundle::{Bundle, Chunk, ChunkPlan, Compiler, CopyCompiler, EmittedAsset, RefId, ScriptedCompiler};
pub use cache::{ContentCache, FileReader, FsReader, MemReader};
pub use emit::{finalize_manifest, rewrite_script_extension};
pub use error::{BuildWarning, GraphError};
pub use extract::{
    derive_files, extract_css_imports, resolve_html_refs, HtmlParser, HtmlRefs, RegexHtmlParser,
};
pub use file::{classify, normalize_path, output_name, FileKind, FileRef, RefRole};
pub use machine::{FileNode, FileState};
pub use orchestrator::{BuildGraph, BuildOptions, Orchestrator};
pub use resources::{
    apply_web_accessible_resources, DEFAULT_MATCH_PATTERNS, DYNAMIC_SCRIPTS_PLACEHOLDER,
};
