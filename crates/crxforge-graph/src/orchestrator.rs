//! Build graph orchestration.
//!
//! A single-threaded worklist drives every file reachable from the root
//! manifest through its lifecycle to settled, then runs the derived-data
//! passes (permissions, accessible resources) over the compiler's bundle
//! and emits the final manifest body as a build output.
//!
//! Only the root manifest can fail the build. Any other file that cannot
//! be read or parsed settles as `error` and is reported as a warning.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crxforge_manifest::{
    derive_permissions_into, permission_set_hash, validate_manifest, Manifest, SchemaVersion,
};

use crate::bundle::{Bundle, Compiler};
use crate::cache::{ContentCache, FileReader};
use crate::emit::finalize_manifest;
use crate::error::{BuildWarning, GraphError};
use crate::extract::html::resolve_html_refs;
use crate::extract::{derive_files, extract_css_imports, HtmlParser, RegexHtmlParser};
use crate::file::{normalize_path, FileKind, FileRef};
use crate::machine::{FileNode, FileState};
use crate::resources::apply_web_accessible_resources;

/// Build configuration.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Fallback extension name when the manifest omits one.
    pub pkg_name: Option<String>,
    /// Fallback extension version.
    pub pkg_version: Option<String>,
    /// Fallback extension description.
    pub pkg_description: Option<String>,
    /// Public key injected as `key` for a stable extension id. A `key`
    /// already declared in the manifest wins.
    pub public_key: Option<String>,
    /// Emit advisory notices for derived-permission changes.
    pub verbose: bool,
    /// File kinds dropped from the build instead of emitted.
    pub exclude_kinds: BTreeSet<FileKind>,
}

/// The settled file graph of one build generation.
#[derive(Debug, Clone)]
pub struct BuildGraph {
    /// Every discovered file, keyed by identity.
    pub files: BTreeMap<PathBuf, FileNode>,
    /// The root manifest id.
    pub root: PathBuf,
    /// Bumped on every full rebuild; node identity is stable within one
    /// generation only.
    pub generation: u64,
    /// Non-fatal conditions collected while settling.
    pub warnings: Vec<BuildWarning>,
    /// Advisory notices (permission changes, defaulted match patterns).
    pub notices: Vec<String>,
}

impl BuildGraph {
    pub(crate) fn new(root: PathBuf, generation: u64) -> Self {
        Self {
            files: BTreeMap::new(),
            root,
            generation,
            warnings: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Looks up a node by identity.
    pub fn node(&self, id: &Path) -> Option<&FileNode> {
        self.files.get(id)
    }

    /// True once every node has settled.
    pub fn is_settled(&self) -> bool {
        self.files.values().all(|n| n.state.is_settled())
    }

    /// Iterates discovered input paths in identity order.
    pub fn inputs(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    fn has_scripts_or_html(&self) -> bool {
        self.files.values().any(|n| {
            (n.kind.is_script() || n.kind == FileKind::Html)
                && !matches!(n.state, FileState::Excluded | FileState::Error)
        })
    }
}

/// Drives a build from manifest to emitted bundle.
pub struct Orchestrator<C: Compiler> {
    options: BuildOptions,
    cache: ContentCache,
    html: Box<dyn HtmlParser>,
    compiler: C,
    src_dir: PathBuf,
    manifest: Option<Manifest>,
    version: Option<SchemaVersion>,
    graph: Option<BuildGraph>,
    bundle: Option<Bundle>,
    manifest_body: Option<serde_json::Value>,
    derived_perms: BTreeSet<String>,
    perms_hash: String,
    asset_changed: bool,
    aborted: bool,
}

impl<C: Compiler> Orchestrator<C> {
    /// Creates an orchestrator over a file reader and a compiler, with the
    /// default regex-backed HTML parser.
    pub fn new(options: BuildOptions, reader: Box<dyn FileReader>, compiler: C) -> Self {
        Self {
            options,
            cache: ContentCache::new(reader),
            html: Box::new(RegexHtmlParser),
            compiler,
            src_dir: PathBuf::new(),
            manifest: None,
            version: None,
            graph: None,
            bundle: None,
            manifest_body: None,
            derived_perms: BTreeSet::new(),
            perms_hash: String::new(),
            asset_changed: false,
            aborted: false,
        }
    }

    /// Replaces the HTML parser seam.
    pub fn with_html_parser(mut self, html: Box<dyn HtmlParser>) -> Self {
        self.html = html;
        self
    }

    /// Builds the full graph from the root manifest and emits the bundle.
    pub fn build(&mut self, manifest_path: &Path) -> Result<(), GraphError> {
        let root = normalize_path(manifest_path);
        let src_dir = root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        self.cache.invalidate(&root);
        let bytes = self
            .cache
            .read(&root)
            .map_err(|source| GraphError::ManifestUnreadable {
                path: root.clone(),
                source,
            })?;
        let manifest =
            Manifest::parse_bytes(&bytes).map_err(|source| GraphError::ManifestInvalid {
                path: root.clone(),
                source,
            })?;
        let version = manifest
            .schema_version()
            .map_err(|source| GraphError::ManifestInvalid {
                path: root.clone(),
                source,
            })?;

        // Coded validation runs again on the final body, where it is
        // fatal; at discovery time it only produces warnings (package
        // metadata defaults may still fill the gaps).
        let validation = validate_manifest(&manifest);

        let generation = self.graph.as_ref().map_or(0, |g| g.generation + 1);
        let mut graph = BuildGraph::new(root.clone(), generation);
        for warning in &validation.warnings {
            graph
                .warnings
                .push(BuildWarning::for_file(&root, warning.to_string()));
        }

        let refs = derive_files(&manifest, &src_dir, version);
        let mut root_node = FileNode::new(root.clone(), "manifest.json".to_string(), FileKind::Manifest);
        root_node.begin_parse();
        root_node.spawn(bytes, refs.iter().map(|r| r.id.clone()).collect());
        graph.files.insert(root.clone(), root_node);

        let worklist: VecDeque<(PathBuf, FileRef)> =
            refs.into_iter().map(|r| (root.clone(), r)).collect();
        self.drive(&mut graph, &src_dir, worklist);

        if !graph.has_scripts_or_html() {
            return Err(GraphError::NoScriptsOrHtml { path: root });
        }

        // The old graph is gone; registrations from it go too.
        self.compiler.clear();
        self.src_dir = src_dir;
        self.manifest = Some(manifest);
        self.version = Some(version);
        self.graph = Some(graph);
        self.asset_changed = false;
        self.aborted = false;
        self.emit()
    }

    /// Reacts to one changed path.
    ///
    /// A root-manifest change discards the graph and rebuilds from scratch
    /// (generation bump). Any other known path is driven through `stale`
    /// in place: removed children are unlinked, added ones spawn fresh.
    /// An unknown path is a no-op.
    pub fn rebuild(&mut self, changed: &Path) -> Result<(), GraphError> {
        let changed = normalize_path(changed);
        let Some(graph) = self.graph.as_ref() else {
            return Err(GraphError::NoGraph);
        };
        if changed == graph.root {
            let root = changed;
            self.cache.invalidate(&root);
            return self.build(&root);
        }
        if !self.cache.invalidate(&changed) {
            return Ok(());
        }

        let mut graph = self.graph.take().ok_or(GraphError::NoGraph)?;
        let src_dir = self.src_dir.clone();

        let Some(node) = graph.files.get_mut(&changed) else {
            self.graph = Some(graph);
            return Ok(());
        };
        let kind = node.kind;
        if !node.mark_stale() {
            self.graph = Some(graph);
            return Ok(());
        }
        // A change confined to assets lets the permission scan be skipped.
        self.asset_changed = !(kind.is_script() || kind == FileKind::Html);
        let old_children: BTreeSet<PathBuf> = node.children.iter().cloned().collect();
        node.begin_parse();

        match self.cache.read(&changed) {
            Err(e) => {
                if let Some(node) = graph.files.get_mut(&changed) {
                    node.fail(e.to_string());
                }
                graph
                    .warnings
                    .push(BuildWarning::for_file(&changed, format!("unreadable: {e}")));
                for child in old_children {
                    unlink(&mut graph, &mut self.cache, &mut self.compiler, &child, &changed);
                }
            }
            Ok(source) => {
                let child_refs = extract_children(self.html.as_ref(), &src_dir, kind, &changed, &source);
                match child_refs {
                    Err(msg) => {
                        if let Some(node) = graph.files.get_mut(&changed) {
                            node.fail(msg.clone());
                        }
                        graph.warnings.push(BuildWarning::for_file(&changed, msg));
                        for child in old_children {
                            unlink(&mut graph, &mut self.cache, &mut self.compiler, &child, &changed);
                        }
                    }
                    Ok(child_refs) => {
                        let new_children: Vec<PathBuf> =
                            child_refs.iter().map(|r| r.id.clone()).collect();
                        let new_set: BTreeSet<PathBuf> = new_children.iter().cloned().collect();
                        for removed in old_children.difference(&new_set) {
                            unlink(&mut graph, &mut self.cache, &mut self.compiler, removed, &changed);
                        }
                        if let Some(node) = graph.files.get_mut(&changed) {
                            node.spawn(source, new_children);
                        }
                        let worklist: VecDeque<(PathBuf, FileRef)> = child_refs
                            .into_iter()
                            .map(|r| (changed.clone(), r))
                            .collect();
                        self.drive(&mut graph, &src_dir, worklist);
                    }
                }
            }
        }

        self.graph = Some(graph);
        self.aborted = false;
        self.emit()
    }

    /// Cancels every machine that has not settled and discards partial
    /// build products. A later `build` starts clean.
    pub fn abort(&mut self) {
        self.aborted = true;
        if let Some(graph) = self.graph.as_mut() {
            for node in graph.files.values_mut() {
                node.cancel();
            }
        }
        self.bundle = None;
        self.manifest_body = None;
    }

    /// The current graph, if a build has run.
    pub fn graph(&self) -> Option<&BuildGraph> {
        self.graph.as_ref()
    }

    /// The completed bundle, including the emitted manifest.
    pub fn bundle(&self) -> Option<&Bundle> {
        self.bundle.as_ref()
    }

    /// The final manifest body.
    pub fn manifest_body(&self) -> Option<&serde_json::Value> {
        self.manifest_body.as_ref()
    }

    /// The derived permission set of the last build.
    pub fn derived_permissions(&self) -> &BTreeSet<String> {
        &self.derived_perms
    }

    /// True after `abort`, until the next build or rebuild.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn drive(
        &mut self,
        graph: &mut BuildGraph,
        src_dir: &Path,
        mut worklist: VecDeque<(PathBuf, FileRef)>,
    ) {
        while let Some((parent, file_ref)) = worklist.pop_front() {
            // Dedupe at dequeue: re-discovery only adds a dependents edge.
            if let Some(existing) = graph.files.get_mut(&file_ref.id) {
                existing.dependents.insert(parent);
                continue;
            }

            let mut node = FileNode::new(file_ref.id.clone(), file_ref.file_name, file_ref.kind);
            node.dependents.insert(parent);

            if self.options.exclude_kinds.contains(&node.kind) {
                node.exclude();
                graph.files.insert(node.id.clone(), node);
                continue;
            }

            node.begin_parse();
            match self.cache.read(&node.id) {
                Err(e) => {
                    node.fail(e.to_string());
                    graph
                        .warnings
                        .push(BuildWarning::for_file(&node.id, format!("unreadable: {e}")));
                }
                Ok(source) => {
                    match extract_children(self.html.as_ref(), src_dir, node.kind, &node.id, &source)
                    {
                        Err(msg) => {
                            node.fail(msg.clone());
                            graph.warnings.push(BuildWarning::for_file(&node.id, msg));
                        }
                        Ok(child_refs) => {
                            let children = child_refs.iter().map(|r| r.id.clone()).collect();
                            node.spawn(source, children);
                            for child_ref in child_refs {
                                worklist.push_back((node.id.clone(), child_ref));
                            }
                        }
                    }
                }
            }
            graph.files.insert(node.id.clone(), node);
        }
    }

    /// Registers settled inputs with the compiler, completes the graph from
    /// the bundle, runs the derived passes, and emits the final manifest.
    fn emit(&mut self) -> Result<(), GraphError> {
        let mut graph = self.graph.take().ok_or(GraphError::NoGraph)?;
        let version = self.version.ok_or(GraphError::NoGraph)?;

        propagate_awaiting(&mut graph);

        for node in graph.files.values_mut() {
            if node.kind == FileKind::Manifest || node.state.is_terminal() {
                continue;
            }
            let Some(source) = node.source.as_ref() else {
                continue;
            };
            let ref_id = if node.kind.is_script() || node.kind == FileKind::Html {
                self.compiler
                    .register_chunk(&node.id, &node.file_name, source.as_ref().clone())
            } else {
                self.compiler
                    .register_asset(&node.file_name, source.as_ref().clone())
            };
            node.ref_id = Some(ref_id);
        }

        let bundle = self.compiler.finish()?;
        complete_from_bundle(&mut graph, &bundle);

        self.derive_permission_set(&mut graph, &bundle);

        let mut manifest = self.manifest.clone().ok_or(GraphError::NoGraph)?;
        let notices =
            apply_web_accessible_resources(&mut manifest, &graph, &bundle, version)?;
        graph.notices.extend(notices);

        let body = finalize_manifest(
            &manifest,
            &self.options,
            &graph,
            &self.derived_perms,
            version,
        )?;
        let pretty = serde_json::to_string_pretty(&body)
            .map_err(|e| GraphError::Compile(format!("manifest serialization failed: {e}")))?;
        let manifest_ref = self
            .compiler
            .register_asset("manifest.json", pretty.into_bytes());
        let bundle = self.compiler.finish()?;

        let root_id = graph.root.clone();
        let root_children_settled = graph.files.get(&root_id).map_or(false, |root| {
            root.children
                .iter()
                .all(|c| graph.files.get(c).map_or(true, |n| n.state.is_settled()))
        });
        if let Some(root) = graph.files.get_mut(&root_id) {
            root.ref_id = Some(manifest_ref);
            if root_children_settled {
                root.complete("manifest.json".to_string());
            } else {
                root.output_file_name = Some("manifest.json".to_string());
            }
        }

        self.manifest_body = Some(body);
        self.bundle = Some(bundle);
        self.graph = Some(graph);
        Ok(())
    }

    /// Scans bundled chunk code against the permission rule table.
    ///
    /// When nothing but assets changed since the last scan and a prior
    /// hash exists, the cached set is reused and the scan skipped.
    fn derive_permission_set(&mut self, graph: &mut BuildGraph, bundle: &Bundle) {
        if self.asset_changed && !self.perms_hash.is_empty() {
            self.asset_changed = false;
            return;
        }

        let mut derived = BTreeSet::new();
        for chunk in bundle.chunks() {
            derive_permissions_into(&mut derived, &chunk.code);
        }
        let hash = permission_set_hash(derived.iter());
        if self.options.verbose && hash != self.perms_hash {
            let list = derived.iter().cloned().collect::<Vec<_>>().join(", ");
            let notice = if self.perms_hash.is_empty() {
                format!("derived permissions: [{list}]")
            } else {
                format!("derived permissions changed: [{list}]")
            };
            graph.notices.push(notice);
        }
        self.derived_perms = derived;
        self.perms_hash = hash;
    }
}

/// Extracts child references for a container kind. Leaf kinds and plain
/// scripts return no children (the compiler resolves script imports).
fn extract_children(
    html: &dyn HtmlParser,
    src_dir: &Path,
    kind: FileKind,
    id: &Path,
    source: &Arc<Vec<u8>>,
) -> Result<Vec<FileRef>, String> {
    match kind {
        FileKind::Html => {
            let text = String::from_utf8_lossy(source);
            let refs = html.parse(&text).map_err(|e| format!("html parse failed: {e}"))?;
            Ok(resolve_html_refs(&refs, src_dir, id))
        }
        FileKind::Css => {
            let text = String::from_utf8_lossy(source);
            Ok(extract_css_imports(&text, src_dir, id))
        }
        _ => Ok(Vec::new()),
    }
}

/// Drops the `parent` edge from `id`; a node left with zero dependents is
/// torn down, cascading through its own children. Teardown withdraws the
/// compiler registration so the next bundle no longer carries the file.
fn unlink<C: Compiler>(
    graph: &mut BuildGraph,
    cache: &mut ContentCache,
    compiler: &mut C,
    id: &Path,
    parent: &Path,
) {
    let Some(node) = graph.files.get_mut(id) else {
        return;
    };
    node.dependents.remove(parent);
    if !node.dependents.is_empty() {
        return;
    }
    let children = node.children.clone();
    let kind = node.kind;
    let file_name = node.file_name.clone();
    graph.files.remove(id);
    cache.invalidate(id);
    if kind.is_script() || kind == FileKind::Html {
        compiler.unregister_chunk(id);
    } else {
        compiler.unregister_asset(&file_name);
    }
    for child in children {
        unlink(graph, cache, compiler, &child, id);
    }
}

/// Records resolved output names, then completes awaiting nodes whose
/// children have all settled. A registration the bundle never resolved
/// blocks its node and every node above it, so a parent cannot reach
/// ready while a child is still waiting on the compiler. Import cycles
/// whose members all resolved complete together.
fn complete_from_bundle(graph: &mut BuildGraph, bundle: &Bundle) {
    for node in graph.files.values_mut() {
        let Some(ref_id) = node.ref_id else { continue };
        if let Some(output) = bundle.output_name(ref_id) {
            node.output_file_name = Some(output.to_string());
        }
    }

    let mut blocked: BTreeSet<PathBuf> = graph
        .files
        .iter()
        .filter(|(_, n)| {
            n.state == FileState::AwaitingCompletion
                && n.kind != FileKind::Manifest
                && n.output_file_name.is_none()
        })
        .map(|(id, _)| id.clone())
        .collect();
    loop {
        let grown: Vec<PathBuf> = graph
            .files
            .iter()
            .filter(|(id, n)| {
                !blocked.contains(*id)
                    && !n.state.is_settled()
                    && n.children.iter().any(|c| blocked.contains(c))
            })
            .map(|(id, _)| id.clone())
            .collect();
        if grown.is_empty() {
            break;
        }
        blocked.extend(grown);
    }

    for node in graph.files.values_mut() {
        if node.state != FileState::AwaitingCompletion || blocked.contains(&node.id) {
            continue;
        }
        if let Some(output) = node.output_file_name.clone() {
            node.complete(output);
        }
    }
}

/// Moves every spawning node whose children have all reached
/// awaiting-completion (or settled) forward, to fixpoint. Reference cycles
/// would otherwise wait on each other forever, so survivors are forced.
fn propagate_awaiting(graph: &mut BuildGraph) {
    loop {
        let mut ready: Vec<PathBuf> = Vec::new();
        for (id, node) in &graph.files {
            if node.state != FileState::Spawning {
                continue;
            }
            let unblocked = node.children.iter().all(|child| {
                graph.files.get(child).map_or(true, |c| {
                    matches!(c.state, FileState::AwaitingCompletion) || c.state.is_settled()
                })
            });
            if unblocked {
                ready.push(id.clone());
            }
        }
        if ready.is_empty() {
            break;
        }
        for id in ready {
            if let Some(node) = graph.files.get_mut(&id) {
                node.await_completion();
            }
        }
    }
    for node in graph.files.values_mut() {
        if node.state == FileState::Spawning {
            node.await_completion();
        }
    }
}
