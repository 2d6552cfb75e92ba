//! Final manifest emission.
//!
//! The emitted body is the parsed manifest with package-metadata defaults
//! filled in, declared and derived permissions merged, source script
//! extensions rewritten to their compiled output names, and an optional
//! public key injected. The body is validated as a whole; any coded error
//! fails the emission with the full collected list.

use std::collections::BTreeSet;

use crxforge_manifest::{combine_permissions, validate_manifest, Manifest, SchemaVersion};

use crate::error::GraphError;
use crate::orchestrator::{BuildGraph, BuildOptions};

/// Produces the final manifest body as a JSON value.
pub fn finalize_manifest(
    manifest: &Manifest,
    options: &BuildOptions,
    graph: &BuildGraph,
    derived_perms: &BTreeSet<String>,
    version: SchemaVersion,
) -> Result<serde_json::Value, GraphError> {
    let mut body = manifest.clone();

    if body.name.is_none() {
        body.name = options.pkg_name.clone();
    }
    if body.version.is_none() {
        body.version = options.pkg_version.clone();
    }
    if body.description.is_none() {
        body.description = options.pkg_description.clone();
    }
    // An explicit key in the manifest wins over the build option.
    if body.key.is_none() {
        body.key = options.public_key.clone();
    }

    body.permissions = combine_permissions(&manifest.permissions, derived_perms);

    if let Some(background) = body.background.as_mut() {
        match version {
            SchemaVersion::V2 => {
                for script in background.scripts.iter_mut() {
                    *script = output_script_name(graph, script);
                }
            }
            SchemaVersion::V3 => {
                if let Some(worker) = background.service_worker.as_mut() {
                    *worker = output_script_name(graph, worker);
                }
            }
        }
    }
    for content_script in body.content_scripts.iter_mut() {
        for js in content_script.js.iter_mut() {
            *js = output_script_name(graph, js);
        }
    }

    let validation = validate_manifest(&body);
    if !validation.is_ok() {
        return Err(GraphError::Validation {
            errors: validation.errors,
            warnings: validation.warnings,
        });
    }

    body.to_value()
        .map_err(|e| GraphError::Compile(format!("manifest serialization failed: {e}")))
}

/// Maps a source-relative script path to its compiled output name.
///
/// The graph mapping wins; with no settled node the TypeScript and JSX
/// extensions are rewritten lexically so the emitted manifest never
/// references a source-only extension.
fn output_script_name(graph: &BuildGraph, source_name: &str) -> String {
    if let Some(node) = graph.files.values().find(|n| n.file_name == source_name) {
        if let Some(output) = &node.output_file_name {
            return output.clone();
        }
    }
    rewrite_script_extension(source_name)
}

/// Rewrites `.ts`, `.tsx`, and `.jsx` to `.js`.
pub fn rewrite_script_extension(name: &str) -> String {
    for ext in [".ts", ".tsx", ".jsx"] {
        if let Some(stem) = name.strip_suffix(ext) {
            return format!("{stem}.js");
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileKind;
    use crate::machine::FileNode;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn empty_graph() -> BuildGraph {
        BuildGraph::new(PathBuf::from("/src/manifest.json"), 0)
    }

    #[test]
    fn rewrites_source_extensions() {
        assert_eq!(rewrite_script_extension("bg.ts"), "bg.js");
        assert_eq!(rewrite_script_extension("app.tsx"), "app.js");
        assert_eq!(rewrite_script_extension("view.jsx"), "view.js");
        assert_eq!(rewrite_script_extension("plain.js"), "plain.js");
        assert_eq!(rewrite_script_extension("styles.css"), "styles.css");
    }

    #[test]
    fn fills_metadata_defaults_and_merges_permissions() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "background": { "service_worker": "sw.ts" },
                "permissions": ["storage", "!history"]
            }"#,
        )
        .unwrap();
        let options = BuildOptions {
            pkg_name: Some("demo".to_string()),
            pkg_version: Some("0.3.0".to_string()),
            pkg_description: Some("a demo".to_string()),
            ..BuildOptions::default()
        };
        let derived: BTreeSet<String> =
            ["alarms", "history"].iter().map(|s| s.to_string()).collect();

        let body = finalize_manifest(
            &manifest,
            &options,
            &empty_graph(),
            &derived,
            SchemaVersion::V3,
        )
        .unwrap();
        assert_eq!(body["name"], "demo");
        assert_eq!(body["version"], "0.3.0");
        assert_eq!(
            body["permissions"],
            serde_json::json!(["alarms", "storage"])
        );
        assert_eq!(body["background"]["service_worker"], "sw.js");
    }

    #[test]
    fn declared_key_wins_over_the_build_option() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "name": "t", "version": "1.0",
                "background": { "service_worker": "sw.js" },
                "key": "declared-key"
            }"#,
        )
        .unwrap();
        let options = BuildOptions {
            public_key: Some("option-key".to_string()),
            ..BuildOptions::default()
        };
        let body = finalize_manifest(
            &manifest,
            &options,
            &empty_graph(),
            &BTreeSet::new(),
            SchemaVersion::V3,
        )
        .unwrap();
        assert_eq!(body["key"], "declared-key");
    }

    #[test]
    fn graph_output_names_override_lexical_rewrites() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "name": "t", "version": "1.0",
                "background": { "service_worker": "sw.ts" }
            }"#,
        )
        .unwrap();
        let mut graph = empty_graph();
        let mut node = FileNode::new(
            PathBuf::from("/src/sw.ts"),
            "sw.ts".to_string(),
            FileKind::BackgroundScript,
        );
        node.output_file_name = Some("sw-abc123.js".to_string());
        graph.files.insert(node.id.clone(), node);

        let body = finalize_manifest(
            &manifest,
            &BuildOptions::default(),
            &graph,
            &BTreeSet::new(),
            SchemaVersion::V3,
        )
        .unwrap();
        assert_eq!(body["background"]["service_worker"], "sw-abc123.js");
    }

    #[test]
    fn validation_errors_on_the_final_body_are_collected() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "background": { "service_worker": "sw.js" }
            }"#,
        )
        .unwrap();
        // No metadata defaults: name and version stay missing.
        let err = finalize_manifest(
            &manifest,
            &BuildOptions::default(),
            &empty_graph(),
            &BTreeSet::new(),
            SchemaVersion::V3,
        )
        .unwrap_err();
        let GraphError::Validation { errors, .. } = err else {
            panic!("expected validation failure");
        };
        assert!(errors.len() >= 2);
    }
}
