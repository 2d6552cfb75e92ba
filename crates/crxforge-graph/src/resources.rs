//! Web-accessible resource resolution.
//!
//! Content scripts run inside web pages, so every output they pull in at
//! runtime must be listed under `web_accessible_resources`. The resolver
//! works from the compiler's completed chunk metadata, not from discovery
//! edges: per content script it unions the non-entry chunks it imports,
//! the CSS those chunks inject, and any emitted assets they reference.
//!
//! v2 produces one flat deduplicated list. v3 scopes each grant to the
//! owning content script's match patterns, grouping entries by their
//! sorted pattern key and merging identical keys.

use std::collections::{BTreeMap, BTreeSet};

use crxforge_manifest::{Manifest, ResourceEntry, SchemaVersion, WebAccessibleResources};

use crate::bundle::Bundle;
use crate::error::GraphError;
use crate::file::FileKind;
use crate::orchestrator::BuildGraph;

/// Match patterns granted to scripts injected at runtime with no
/// declared scope of their own.
pub const DEFAULT_MATCH_PATTERNS: [&str; 2] = ["http://*/*", "https://*/*"];

/// Declared resource entry that stands in for scripts injected at
/// runtime. An entry listing it donates its match patterns to those
/// scripts' resources instead of falling back to the defaults.
pub const DYNAMIC_SCRIPTS_PLACEHOLDER: &str = "<dynamic_scripts>";

/// Rewrites `manifest.web_accessible_resources` (and content script `css`
/// lists) from the bundle. Returns advisory notices.
pub fn apply_web_accessible_resources(
    manifest: &mut Manifest,
    graph: &BuildGraph,
    bundle: &Bundle,
    version: SchemaVersion,
) -> Result<Vec<String>, GraphError> {
    let mut notices = Vec::new();

    // Declared entries survive; derived grants are merged into them. An
    // entry carrying the dynamic-scripts placeholder scopes runtime
    // injections to its own patterns.
    let mut flat: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, (Vec<String>, BTreeSet<String>)> = BTreeMap::new();
    let mut dynamic_key: Option<String> = None;
    match (&manifest.web_accessible_resources, version) {
        (Some(WebAccessibleResources::Flat(declared)), _) => {
            flat.extend(
                declared
                    .iter()
                    .filter(|r| r.as_str() != DYNAMIC_SCRIPTS_PLACEHOLDER)
                    .cloned(),
            );
        }
        (Some(WebAccessibleResources::Scoped(declared)), _) => {
            for entry in declared {
                let (key, matches) = match_key(&entry.matches);
                if dynamic_key.is_none()
                    && entry.resources.iter().any(|r| r.as_str() == DYNAMIC_SCRIPTS_PLACEHOLDER)
                {
                    dynamic_key = Some(key.clone());
                }
                let slot = groups.entry(key).or_insert_with(|| (matches, BTreeSet::new()));
                slot.1.extend(
                    entry
                        .resources
                        .iter()
                        .filter(|r| r.as_str() != DYNAMIC_SCRIPTS_PLACEHOLDER)
                        .cloned(),
                );
            }
        }
        (None, _) => {}
    }

    for script in &mut manifest.content_scripts {
        let mut resources: BTreeSet<String> = BTreeSet::new();
        let mut css: Vec<String> = Vec::new();

        for js in &script.js {
            let Some(node) = graph.files.values().find(|n| n.file_name == *js) else {
                continue;
            };
            let Some(chunk) = bundle.chunk_for_source(&node.id) else {
                continue;
            };
            collect_chunk_resources(
                bundle,
                chunk.file_name.as_str(),
                version == SchemaVersion::V3,
                &mut resources,
                &mut css,
            );
        }

        // Imported stylesheets inject alongside the script.
        for sheet in &css {
            if !script.css.contains(sheet) {
                script.css.push(sheet.clone());
            }
        }
        resources.extend(css);

        if resources.is_empty() {
            continue;
        }
        match version {
            SchemaVersion::V2 => flat.extend(resources),
            SchemaVersion::V3 => {
                let matches = script.matches.clone().unwrap_or_default();
                if matches.is_empty() {
                    return Err(GraphError::MissingMatches {
                        script: script
                            .js
                            .first()
                            .cloned()
                            .unwrap_or_else(|| "content script".to_string()),
                    });
                }
                let (key, matches) = match_key(&matches);
                let slot = groups.entry(key).or_insert_with(|| (matches, BTreeSet::new()));
                slot.1.extend(resources);
            }
        }
    }

    if version == SchemaVersion::V3 {
        apply_dynamic_scripts(graph, bundle, &mut groups, &mut notices, dynamic_key.as_deref());
    }

    manifest.web_accessible_resources = match version {
        SchemaVersion::V2 => {
            let mut seen = BTreeSet::new();
            flat.retain(|r| seen.insert(r.clone()));
            if flat.is_empty() {
                None
            } else {
                Some(WebAccessibleResources::Flat(flat))
            }
        }
        SchemaVersion::V3 => {
            let entries: Vec<ResourceEntry> = groups
                .into_values()
                .filter(|(_, resources)| !resources.is_empty())
                .map(|(matches, resources)| {
                    ResourceEntry::new(matches, resources.into_iter().collect())
                })
                .collect();
            if entries.is_empty() {
                None
            } else {
                Some(WebAccessibleResources::Scoped(entries))
            }
        }
    };

    Ok(notices)
}

/// Scripts injected at runtime (service workers and web-accessible
/// modules) cannot scope their imports to a page. Their imports land in
/// the declared placeholder entry when one exists, otherwise under
/// [`DEFAULT_MATCH_PATTERNS`] with a notice.
fn apply_dynamic_scripts(
    graph: &BuildGraph,
    bundle: &Bundle,
    groups: &mut BTreeMap<String, (Vec<String>, BTreeSet<String>)>,
    notices: &mut Vec<String>,
    dynamic_key: Option<&str>,
) {
    let mut resources: BTreeSet<String> = BTreeSet::new();
    let mut css: Vec<String> = Vec::new();
    for node in graph.files.values() {
        if !matches!(node.kind, FileKind::Module | FileKind::BackgroundScript) {
            continue;
        }
        let Some(chunk) = bundle.chunk_for_source(&node.id) else {
            continue;
        };
        collect_chunk_resources(bundle, chunk.file_name.as_str(), true, &mut resources, &mut css);
    }
    resources.extend(css);
    if resources.is_empty() {
        return;
    }

    if let Some(key) = dynamic_key {
        if let Some(slot) = groups.get_mut(key) {
            slot.1.extend(resources);
            return;
        }
    }

    let default_matches: Vec<String> = DEFAULT_MATCH_PATTERNS.iter().map(|s| s.to_string()).collect();
    let (key, matches) = match_key(&default_matches);
    if !groups.contains_key(&key) {
        notices.push(format!(
            "using default match patterns for dynamically injected scripts: {}",
            DEFAULT_MATCH_PATTERNS.join(", ")
        ));
    }
    let slot = groups.entry(key).or_insert_with(|| (matches, BTreeSet::new()));
    slot.1.extend(resources);
}

/// Grouping key: the sorted, deduplicated pattern list.
fn match_key(matches: &[String]) -> (String, Vec<String>) {
    let mut sorted: Vec<String> = matches.to_vec();
    sorted.sort();
    sorted.dedup();
    (sorted.join("\u{1f}"), sorted)
}

/// Unions the non-entry chunks reachable from `file_name` into
/// `resources`, plus the assets and stylesheets they pull in. When
/// `transitive` is false only direct imports are walked.
fn collect_chunk_resources(
    bundle: &Bundle,
    file_name: &str,
    transitive: bool,
    resources: &mut BTreeSet<String>,
    css: &mut Vec<String>,
) {
    let mut stack: Vec<String> = vec![file_name.to_string()];
    let mut visited: BTreeSet<String> = BTreeSet::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(chunk) = bundle.chunk(&current) else {
            continue;
        };
        for sheet in &chunk.imported_css {
            if !css.contains(sheet) {
                css.push(sheet.clone());
            }
        }
        resources.extend(chunk.imported_assets.iter().cloned());
        for import in chunk.imports.iter().chain(&chunk.dynamic_imports) {
            if let Some(imported) = bundle.chunk(import) {
                if !imported.is_entry {
                    resources.insert(import.clone());
                }
            }
            if transitive {
                stack.push(import.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Chunk, Compiler, ScriptedCompiler};
    use crate::machine::FileNode;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    fn graph_with(nodes: Vec<FileNode>) -> BuildGraph {
        let mut graph = BuildGraph::new(PathBuf::from("/src/manifest.json"), 0);
        for node in nodes {
            graph.files.insert(node.id.clone(), node);
        }
        graph
    }

    fn script_node(id: &str, file_name: &str, kind: FileKind) -> FileNode {
        FileNode::new(PathBuf::from(id), file_name.to_string(), kind)
    }

    fn bundle_with(chunks: Vec<Chunk>) -> Bundle {
        let mut bundle = Bundle::new();
        for chunk in chunks {
            bundle.add_shared_chunk(chunk);
        }
        bundle
    }

    fn entry_chunk(file_name: &str, facade: &str) -> Chunk {
        Chunk {
            file_name: file_name.to_string(),
            facade_id: Some(PathBuf::from(facade)),
            is_entry: true,
            ..Chunk::default()
        }
    }

    #[test]
    fn v2_produces_a_flat_deduplicated_list() {
        let mut manifest = Manifest::parse(
            r#"{
                "manifest_version": 2,
                "web_accessible_resources": ["declared.png"],
                "content_scripts": [
                    { "js": ["ct.js"], "matches": ["https://*/*"] }
                ]
            }"#,
        )
        .unwrap();
        let graph = graph_with(vec![script_node("/src/ct.js", "ct.js", FileKind::ContentScript)]);

        let mut entry = entry_chunk("ct.js", "/src/ct.js");
        entry.imports = vec!["chunks/shared.js".to_string()];
        entry.imported_css = vec!["ct.css".to_string()];
        let shared = Chunk {
            file_name: "chunks/shared.js".to_string(),
            ..Chunk::default()
        };
        let bundle = bundle_with(vec![entry, shared]);

        let notices =
            apply_web_accessible_resources(&mut manifest, &graph, &bundle, SchemaVersion::V2)
                .unwrap();
        assert!(notices.is_empty());
        // The entry chunk itself is never exposed.
        assert_eq!(
            manifest.web_accessible_resources,
            Some(WebAccessibleResources::Flat(vec![
                "declared.png".to_string(),
                "chunks/shared.js".to_string(),
                "ct.css".to_string(),
            ]))
        );
        assert_eq!(manifest.content_scripts[0].css, vec!["ct.css"]);
    }

    #[test]
    fn declared_placeholder_scopes_dynamic_script_imports() {
        let mut manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "web_accessible_resources": [
                    { "resources": ["<dynamic_scripts>"], "matches": ["https://app.example/*"] }
                ]
            }"#,
        )
        .unwrap();
        let graph = graph_with(vec![script_node(
            "/src/inject.js",
            "inject.js",
            FileKind::Module,
        )]);
        let mut entry = entry_chunk("inject.js", "/src/inject.js");
        entry.imports = vec!["chunks/dep.js".to_string()];
        let bundle = bundle_with(vec![
            entry,
            Chunk {
                file_name: "chunks/dep.js".to_string(),
                ..Chunk::default()
            },
        ]);

        let notices =
            apply_web_accessible_resources(&mut manifest, &graph, &bundle, SchemaVersion::V3)
                .unwrap();
        assert!(notices.is_empty());
        let Some(WebAccessibleResources::Scoped(entries)) = &manifest.web_accessible_resources
        else {
            panic!("expected scoped entries");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].matches, vec!["https://app.example/*"]);
        assert_eq!(entries[0].resources, vec!["chunks/dep.js".to_string()]);
    }

    #[test]
    fn v3_groups_by_match_patterns_and_merges_identical_keys() {
        let mut manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "content_scripts": [
                    { "js": ["a.js"], "matches": ["https://a.example/*"] },
                    { "js": ["b.js"], "matches": ["https://b.example/*"] },
                    { "js": ["c.js"], "matches": ["https://a.example/*"] }
                ]
            }"#,
        )
        .unwrap();
        let graph = graph_with(vec![
            script_node("/src/a.js", "a.js", FileKind::ContentScript),
            script_node("/src/b.js", "b.js", FileKind::ContentScript),
            script_node("/src/c.js", "c.js", FileKind::ContentScript),
        ]);

        let mut a = entry_chunk("a.js", "/src/a.js");
        a.imports = vec!["chunks/one.js".to_string()];
        let mut b = entry_chunk("b.js", "/src/b.js");
        b.imports = vec!["chunks/two.js".to_string()];
        let mut c = entry_chunk("c.js", "/src/c.js");
        c.imports = vec!["chunks/three.js".to_string()];
        let shared = |name: &str| Chunk {
            file_name: name.to_string(),
            ..Chunk::default()
        };
        let bundle = bundle_with(vec![
            a,
            b,
            c,
            shared("chunks/one.js"),
            shared("chunks/two.js"),
            shared("chunks/three.js"),
        ]);

        apply_web_accessible_resources(&mut manifest, &graph, &bundle, SchemaVersion::V3).unwrap();
        let Some(WebAccessibleResources::Scoped(entries)) = &manifest.web_accessible_resources
        else {
            panic!("expected scoped entries");
        };
        assert_eq!(entries.len(), 2);
        let a_entry = entries
            .iter()
            .find(|e| e.matches == vec!["https://a.example/*"])
            .unwrap();
        assert_eq!(
            a_entry.resources,
            vec!["chunks/one.js".to_string(), "chunks/three.js".to_string()]
        );
        let b_entry = entries
            .iter()
            .find(|e| e.matches == vec!["https://b.example/*"])
            .unwrap();
        assert_eq!(b_entry.resources, vec!["chunks/two.js".to_string()]);
    }

    #[test]
    fn v3_content_script_without_matches_fails() {
        let mut manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "content_scripts": [ { "js": ["a.js"] } ]
            }"#,
        )
        .unwrap();
        let graph = graph_with(vec![script_node("/src/a.js", "a.js", FileKind::ContentScript)]);
        let mut a = entry_chunk("a.js", "/src/a.js");
        a.imports = vec!["chunks/one.js".to_string()];
        let bundle = bundle_with(vec![
            a,
            Chunk {
                file_name: "chunks/one.js".to_string(),
                ..Chunk::default()
            },
        ]);

        let err =
            apply_web_accessible_resources(&mut manifest, &graph, &bundle, SchemaVersion::V3)
                .unwrap_err();
        assert!(matches!(err, GraphError::MissingMatches { script } if script == "a.js"));
    }

    #[test]
    fn dynamic_script_imports_get_default_patterns_with_a_notice() {
        let mut manifest = Manifest::parse(r#"{ "manifest_version": 3 }"#).unwrap();
        let graph = graph_with(vec![script_node(
            "/src/inject.js",
            "inject.js",
            FileKind::Module,
        )]);
        let mut entry = entry_chunk("inject.js", "/src/inject.js");
        entry.imports = vec!["chunks/dep.js".to_string()];
        let bundle = bundle_with(vec![
            entry,
            Chunk {
                file_name: "chunks/dep.js".to_string(),
                ..Chunk::default()
            },
        ]);

        let notices =
            apply_web_accessible_resources(&mut manifest, &graph, &bundle, SchemaVersion::V3)
                .unwrap();
        assert_eq!(notices.len(), 1);
        let Some(WebAccessibleResources::Scoped(entries)) = &manifest.web_accessible_resources
        else {
            panic!("expected scoped entries");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].matches, vec!["http://*/*", "https://*/*"]);
        assert_eq!(entries[0].resources, vec!["chunks/dep.js".to_string()]);
    }

    #[test]
    fn empty_results_drop_the_field() {
        let mut manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "content_scripts": [
                    { "js": ["a.js"], "matches": ["https://*/*"] }
                ]
            }"#,
        )
        .unwrap();
        let graph = graph_with(vec![script_node("/src/a.js", "a.js", FileKind::ContentScript)]);
        // Self-contained entry chunk: nothing to expose.
        let mut compiler = ScriptedCompiler::new();
        compiler.register_chunk(Path::new("/src/a.js"), "a.js", b"code()".to_vec());
        let bundle = compiler.finish().unwrap();

        apply_web_accessible_resources(&mut manifest, &graph, &bundle, SchemaVersion::V3).unwrap();
        assert_eq!(manifest.web_accessible_resources, None);
    }
}
