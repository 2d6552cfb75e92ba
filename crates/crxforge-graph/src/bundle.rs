//! The external-compiler seam.
//!
//! The graph never compiles anything itself. It registers every script and
//! HTML entry with a [`Compiler`], hands over static assets, and later
//! consumes the completed [`Bundle`]: output names per registration, plus
//! per-chunk import metadata that drives accessible-resource resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::GraphError;

/// Opaque handle returned when a file is registered for compilation,
/// resolved to a final output path once the compiler completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefId(u32);

impl RefId {
    /// Creates a ref id from a raw index. Intended for `Compiler` impls.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

/// One compiled output chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    /// Final output path.
    pub file_name: String,
    /// The source file this chunk is the compiled entry for, if any.
    pub facade_id: Option<PathBuf>,
    /// True if the chunk is a build entry point.
    pub is_entry: bool,
    /// Compiled code, scanned by permission derivation.
    pub code: String,
    /// Output names of statically imported chunks.
    pub imports: Vec<String>,
    /// Output names of dynamically imported chunks.
    pub dynamic_imports: Vec<String>,
    /// Output names of CSS files this chunk pulls in.
    pub imported_css: Vec<String>,
    /// Output names of non-script assets this chunk pulls in.
    pub imported_assets: Vec<String>,
}

/// A non-compiled output copied through as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Final output path.
    pub file_name: String,
    /// Raw contents.
    pub source: Vec<u8>,
}

/// A completed build: chunks and assets keyed by output name, plus the
/// registration-to-output mapping.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    chunks: BTreeMap<String, Chunk>,
    assets: BTreeMap<String, EmittedAsset>,
    by_ref: BTreeMap<RefId, String>,
}

impl Bundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chunk, recording its output name for `ref_id`.
    pub fn add_chunk(&mut self, ref_id: RefId, chunk: Chunk) {
        self.by_ref.insert(ref_id, chunk.file_name.clone());
        self.chunks.insert(chunk.file_name.clone(), chunk);
    }

    /// Adds a shared (non-registered) chunk.
    pub fn add_shared_chunk(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.file_name.clone(), chunk);
    }

    /// Adds an asset, recording its output name for `ref_id`.
    pub fn add_asset(&mut self, ref_id: RefId, asset: EmittedAsset) {
        self.by_ref.insert(ref_id, asset.file_name.clone());
        self.assets.insert(asset.file_name.clone(), asset);
    }

    /// Resolves a registration to its final output name.
    pub fn output_name(&self, ref_id: RefId) -> Option<&str> {
        self.by_ref.get(&ref_id).map(String::as_str)
    }

    /// Looks up a chunk by output name.
    pub fn chunk(&self, file_name: &str) -> Option<&Chunk> {
        self.chunks.get(file_name)
    }

    /// Looks up the chunk compiled from a given source file.
    pub fn chunk_for_source(&self, id: &Path) -> Option<&Chunk> {
        self.chunks
            .values()
            .find(|c| c.facade_id.as_deref() == Some(id))
    }

    /// Iterates all chunks in output-name order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Iterates all assets in output-name order.
    pub fn assets(&self) -> impl Iterator<Item = &EmittedAsset> {
        self.assets.values()
    }

    /// Total number of outputs.
    pub fn len(&self) -> usize {
        self.chunks.len() + self.assets.len()
    }

    /// True if the bundle has no outputs.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.assets.is_empty()
    }
}

/// The external compiler interface.
///
/// Registration is asynchronous from the graph's point of view: a
/// [`RefId`] comes back immediately, the output name only with the
/// finished [`Bundle`]. Re-registering the same source id replaces the
/// previous registration (incremental rebuilds).
pub trait Compiler {
    /// Requests compilation of a script or HTML entry point.
    fn register_chunk(&mut self, id: &Path, file_name: &str, source: Vec<u8>) -> RefId;

    /// Hands over a static asset to copy through unchanged.
    fn register_asset(&mut self, file_name: &str, source: Vec<u8>) -> RefId;

    /// Withdraws the chunk registration for a source file that left the
    /// graph. Unknown ids are a no-op.
    fn unregister_chunk(&mut self, id: &Path);

    /// Withdraws an asset registration by output name. Unknown names are
    /// a no-op.
    fn unregister_asset(&mut self, file_name: &str);

    /// Drops every registration. A full rebuild discards the graph and
    /// re-registers from scratch, so stale outputs never carry over.
    fn clear(&mut self);

    /// Compiles everything registered so far and returns the bundle.
    /// May be called once per build pass; registrations survive across
    /// calls so incremental rebuilds re-finish the same set.
    fn finish(&mut self) -> Result<Bundle, GraphError>;
}

#[derive(Debug, Clone)]
enum Registration {
    Chunk {
        id: PathBuf,
        file_name: String,
        source: Vec<u8>,
    },
    Asset {
        file_name: String,
        source: Vec<u8>,
    },
}

/// A pass-through compiler: every registered script becomes its own entry
/// chunk with its source text as code and no imports. Lets the pipeline
/// run end-to-end without a host bundler; a real bundler integrates by
/// implementing [`Compiler`] instead.
#[derive(Debug, Default)]
pub struct CopyCompiler {
    registrations: Vec<(RefId, Registration)>,
    next: u32,
}

impl CopyCompiler {
    /// Creates an empty compiler.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ref(&mut self) -> RefId {
        let ref_id = RefId::from_raw(self.next);
        self.next += 1;
        ref_id
    }

    fn replace_chunk(&mut self, id: &Path) -> Option<usize> {
        self.registrations.iter().position(|(_, r)| {
            matches!(r, Registration::Chunk { id: existing, .. } if existing == id)
        })
    }
}

impl Compiler for CopyCompiler {
    fn register_chunk(&mut self, id: &Path, file_name: &str, source: Vec<u8>) -> RefId {
        let registration = Registration::Chunk {
            id: id.to_path_buf(),
            file_name: file_name.to_string(),
            source,
        };
        if let Some(pos) = self.replace_chunk(id) {
            let ref_id = self.registrations[pos].0;
            self.registrations[pos].1 = registration;
            return ref_id;
        }
        let ref_id = self.next_ref();
        self.registrations.push((ref_id, registration));
        ref_id
    }

    fn register_asset(&mut self, file_name: &str, source: Vec<u8>) -> RefId {
        let registration = Registration::Asset {
            file_name: file_name.to_string(),
            source,
        };
        if let Some(pos) = self.registrations.iter().position(|(_, r)| {
            matches!(r, Registration::Asset { file_name: existing, .. } if existing == file_name)
        }) {
            let ref_id = self.registrations[pos].0;
            self.registrations[pos].1 = registration;
            return ref_id;
        }
        let ref_id = self.next_ref();
        self.registrations.push((ref_id, registration));
        ref_id
    }

    fn unregister_chunk(&mut self, id: &Path) {
        self.registrations.retain(|(_, r)| {
            !matches!(r, Registration::Chunk { id: existing, .. } if existing == id)
        });
    }

    fn unregister_asset(&mut self, file_name: &str) {
        self.registrations.retain(|(_, r)| {
            !matches!(r, Registration::Asset { file_name: existing, .. } if existing == file_name)
        });
    }

    fn clear(&mut self) {
        self.registrations.clear();
    }

    fn finish(&mut self) -> Result<Bundle, GraphError> {
        let mut bundle = Bundle::new();
        for (ref_id, registration) in &self.registrations {
            match registration {
                Registration::Chunk {
                    id,
                    file_name,
                    source,
                } => {
                    bundle.add_chunk(
                        *ref_id,
                        Chunk {
                            file_name: file_name.clone(),
                            facade_id: Some(id.clone()),
                            is_entry: true,
                            code: String::from_utf8_lossy(source).into_owned(),
                            ..Chunk::default()
                        },
                    );
                }
                Registration::Asset { file_name, source } => {
                    bundle.add_asset(
                        *ref_id,
                        EmittedAsset {
                            file_name: file_name.clone(),
                            source: source.clone(),
                        },
                    );
                }
            }
        }
        Ok(bundle)
    }
}

/// Per-source compile plan for [`ScriptedCompiler`].
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    /// Compiled code override; defaults to the registered source text.
    pub code: Option<String>,
    /// Output names of statically imported chunks.
    pub imports: Vec<String>,
    /// Output names of dynamically imported chunks.
    pub dynamic_imports: Vec<String>,
    /// Output names of imported CSS files.
    pub imported_css: Vec<String>,
    /// Output names of imported assets.
    pub imported_assets: Vec<String>,
}

/// A scriptable compiler for tests and host integrations: behaves like
/// [`CopyCompiler`] but lets callers declare per-source chunk metadata and
/// extra shared (non-entry) chunks, emulating a real bundler's output.
#[derive(Debug, Default)]
pub struct ScriptedCompiler {
    inner: CopyCompiler,
    plans: BTreeMap<PathBuf, ChunkPlan>,
    shared: Vec<Chunk>,
    withheld: BTreeSet<PathBuf>,
}

impl ScriptedCompiler {
    /// Creates an empty compiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the compile plan for a source file.
    pub fn plan(&mut self, id: impl Into<PathBuf>, plan: ChunkPlan) -> &mut Self {
        self.plans.insert(id.into(), plan);
        self
    }

    /// Registers `id` normally but never emits an output for it,
    /// emulating a bundler that has not finished that file.
    pub fn withhold(&mut self, id: impl Into<PathBuf>) -> &mut Self {
        self.withheld.insert(id.into());
        self
    }

    /// Declares a shared non-entry chunk present in the bundle.
    pub fn shared_chunk(&mut self, file_name: impl Into<String>, code: impl Into<String>) -> &mut Self {
        self.shared.push(Chunk {
            file_name: file_name.into(),
            is_entry: false,
            code: code.into(),
            ..Chunk::default()
        });
        self
    }
}

impl Compiler for ScriptedCompiler {
    fn register_chunk(&mut self, id: &Path, file_name: &str, source: Vec<u8>) -> RefId {
        self.inner.register_chunk(id, file_name, source)
    }

    fn register_asset(&mut self, file_name: &str, source: Vec<u8>) -> RefId {
        self.inner.register_asset(file_name, source)
    }

    fn unregister_chunk(&mut self, id: &Path) {
        self.inner.unregister_chunk(id);
    }

    fn unregister_asset(&mut self, file_name: &str) {
        self.inner.unregister_asset(file_name);
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn finish(&mut self) -> Result<Bundle, GraphError> {
        let mut bundle = Bundle::new();
        for (ref_id, registration) in &self.inner.registrations {
            match registration {
                Registration::Chunk {
                    id,
                    file_name,
                    source,
                } => {
                    if self.withheld.contains(id) {
                        continue;
                    }
                    let plan = self.plans.get(id).cloned().unwrap_or_default();
                    bundle.add_chunk(
                        *ref_id,
                        Chunk {
                            file_name: file_name.clone(),
                            facade_id: Some(id.clone()),
                            is_entry: true,
                            code: plan
                                .code
                                .unwrap_or_else(|| String::from_utf8_lossy(source).into_owned()),
                            imports: plan.imports,
                            dynamic_imports: plan.dynamic_imports,
                            imported_css: plan.imported_css,
                            imported_assets: plan.imported_assets,
                        },
                    );
                }
                Registration::Asset { file_name, source } => {
                    bundle.add_asset(
                        *ref_id,
                        EmittedAsset {
                            file_name: file_name.clone(),
                            source: source.clone(),
                        },
                    );
                }
            }
        }
        for chunk in &self.shared {
            bundle.add_shared_chunk(chunk.clone());
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn copy_compiler_passes_sources_through() {
        let mut compiler = CopyCompiler::new();
        let ref_js = compiler.register_chunk(Path::new("/src/bg.js"), "bg.js", b"code()".to_vec());
        let ref_png = compiler.register_asset("icon.png", vec![1, 2, 3]);

        let bundle = compiler.finish().unwrap();
        assert_eq!(bundle.output_name(ref_js), Some("bg.js"));
        assert_eq!(bundle.output_name(ref_png), Some("icon.png"));
        let chunk = bundle.chunk("bg.js").unwrap();
        assert!(chunk.is_entry);
        assert_eq!(chunk.code, "code()");
        assert_eq!(chunk.facade_id.as_deref(), Some(Path::new("/src/bg.js")));
    }

    #[test]
    fn re_registration_keeps_the_ref_id() {
        let mut compiler = CopyCompiler::new();
        let first = compiler.register_chunk(Path::new("/src/bg.js"), "bg.js", b"v1".to_vec());
        let second = compiler.register_chunk(Path::new("/src/bg.js"), "bg.js", b"v2".to_vec());
        assert_eq!(first, second);

        let bundle = compiler.finish().unwrap();
        assert_eq!(bundle.chunk("bg.js").unwrap().code, "v2");
    }

    #[test]
    fn unregistered_files_drop_out_of_the_bundle() {
        let mut compiler = CopyCompiler::new();
        compiler.register_chunk(Path::new("/src/bg.js"), "bg.js", b"bg()".to_vec());
        compiler.register_asset("icon.png", vec![1]);
        compiler.unregister_chunk(Path::new("/src/bg.js"));
        compiler.unregister_asset("icon.png");

        let bundle = compiler.finish().unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn clear_starts_a_fresh_registration_set() {
        let mut compiler = CopyCompiler::new();
        compiler.register_chunk(Path::new("/src/old.js"), "old.js", b"old()".to_vec());
        compiler.clear();
        compiler.register_chunk(Path::new("/src/new.js"), "new.js", b"new()".to_vec());

        let bundle = compiler.finish().unwrap();
        assert!(bundle.chunk("old.js").is_none());
        assert!(bundle.chunk("new.js").is_some());
    }

    #[test]
    fn withheld_registrations_resolve_to_no_output() {
        let mut compiler = ScriptedCompiler::new();
        compiler.withhold("/src/slow.js");
        let ref_id = compiler.register_chunk(Path::new("/src/slow.js"), "slow.js", b"slow()".to_vec());

        let bundle = compiler.finish().unwrap();
        assert_eq!(bundle.output_name(ref_id), None);
        assert!(bundle.chunk("slow.js").is_none());
    }

    #[test]
    fn scripted_compiler_applies_plans_and_shared_chunks() {
        let mut compiler = ScriptedCompiler::new();
        compiler
            .plan(
                "/src/ct.js",
                ChunkPlan {
                    imports: vec!["chunks/shared.js".to_string()],
                    imported_css: vec!["ct.css".to_string()],
                    ..ChunkPlan::default()
                },
            )
            .shared_chunk("chunks/shared.js", "shared()");

        compiler.register_chunk(Path::new("/src/ct.js"), "ct.js", b"entry()".to_vec());
        let bundle = compiler.finish().unwrap();

        let entry = bundle.chunk("ct.js").unwrap();
        assert_eq!(entry.imports, vec!["chunks/shared.js"]);
        assert_eq!(entry.imported_css, vec!["ct.css"]);
        let shared = bundle.chunk("chunks/shared.js").unwrap();
        assert!(!shared.is_entry);
    }
}
