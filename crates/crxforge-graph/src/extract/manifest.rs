//! Manifest reference extraction.
//!
//! Walks the schema-version-specific manifest fields and returns every
//! referenced file, typed by the role it was referenced in.
//! `web_accessible_resources` globs are expanded against the source root
//! at discovery time; expansion results are bucketed by extension and the
//! leftovers (fonts and the like) classified raw by set difference.

use std::collections::BTreeSet;
use std::path::Path;

use crxforge_manifest::{IconValue, Manifest, SchemaVersion, WebAccessibleResources};

use crate::file::{classify, FileRef, RefRole};
use crate::resources::DYNAMIC_SCRIPTS_PLACEHOLDER;

/// Derives every file referenced by the manifest, in field order:
/// scripts, pages, stylesheets, icons, then the remaining
/// web-accessible leftovers.
pub fn derive_files(manifest: &Manifest, src_dir: &Path, version: SchemaVersion) -> Vec<FileRef> {
    let war_paths = expand_web_accessible(manifest, src_dir);

    let mut refs: Vec<FileRef> = Vec::new();
    let mut seen: BTreeSet<std::path::PathBuf> = BTreeSet::new();
    let mut push = |role: RefRole, path: &str| {
        if path.is_empty() {
            return;
        }
        let kind = classify(role, Path::new(path));
        let file_ref = FileRef::resolved(kind, src_dir, path);
        // First classification wins; a later role never re-types the file.
        if seen.insert(file_ref.id.clone()) {
            refs.push(file_ref);
        }
    };

    // Scripts
    if let Some(background) = &manifest.background {
        match version {
            SchemaVersion::V2 => {
                for script in &background.scripts {
                    push(RefRole::BackgroundScript, script);
                }
            }
            SchemaVersion::V3 => {
                if let Some(worker) = &background.service_worker {
                    push(RefRole::BackgroundScript, worker);
                }
            }
        }
    }
    for script in &manifest.content_scripts {
        for js in &script.js {
            push(RefRole::ContentScriptJs, js);
        }
    }
    for path in war_paths.iter().filter(|p| is_script_path(p)) {
        push(RefRole::WebAccessible, path);
    }

    // HTML pages
    if version == SchemaVersion::V2 {
        if let Some(background) = &manifest.background {
            if let Some(page) = &background.page {
                push(RefRole::Page, page);
            }
        }
    }
    for page in [
        manifest.options_page.as_deref(),
        manifest.options_ui.as_ref().and_then(|o| o.page.as_deref()),
        manifest.devtools_page.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        push(RefRole::Page, page);
    }
    for action in manifest_actions(manifest, version) {
        if let Some(popup) = &action.default_popup {
            push(RefRole::Page, popup);
        }
    }
    for page in manifest.chrome_url_overrides.values() {
        push(RefRole::Page, page);
    }
    for path in war_paths.iter().filter(|p| is_html_path(p)) {
        push(RefRole::WebAccessible, path);
    }

    // Stylesheets
    for script in &manifest.content_scripts {
        for css in &script.css {
            push(RefRole::ContentScriptCss, css);
        }
    }
    for path in war_paths.iter().filter(|p| is_css_path(p)) {
        push(RefRole::WebAccessible, path);
    }

    // Images
    for icon in manifest.icons.values() {
        push(RefRole::Icon, icon);
    }
    for action in manifest_actions(manifest, version) {
        if let Some(icon) = &action.default_icon {
            match icon {
                IconValue::Single(path) => push(RefRole::Icon, path),
                IconValue::Sized(map) => {
                    for path in map.values() {
                        push(RefRole::Icon, path);
                    }
                }
            }
        }
    }
    for path in war_paths.iter().filter(|p| is_image_path(p)) {
        push(RefRole::WebAccessible, path);
    }

    // Locale messages
    if manifest.extra.contains_key("default_locale") {
        for path in expand_glob(src_dir, "_locales/*/messages.json") {
            push(RefRole::Locale, &path);
        }
    }

    // Everything else reachable through web_accessible_resources: fonts,
    // wasm, data files. Set difference against the four buckets above.
    for path in war_paths.iter().filter(|p| {
        !is_script_path(p) && !is_html_path(p) && !is_css_path(p) && !is_image_path(p)
    }) {
        push(RefRole::WebAccessible, path);
    }

    refs
}

fn manifest_actions(
    manifest: &Manifest,
    version: SchemaVersion,
) -> impl Iterator<Item = &crxforge_manifest::Action> {
    let (action, browser, page) = match version {
        SchemaVersion::V2 => (None, manifest.browser_action.as_ref(), manifest.page_action.as_ref()),
        SchemaVersion::V3 => (manifest.action.as_ref(), None, None),
    };
    action.into_iter().chain(browser).chain(page)
}

/// Expands `web_accessible_resources` declarations to concrete
/// source-relative paths. Patterns with glob magic are matched against the
/// source root; plain paths pass through.
fn expand_web_accessible(manifest: &Manifest, src_dir: &Path) -> Vec<String> {
    let Some(war) = &manifest.web_accessible_resources else {
        return Vec::new();
    };

    let mut out: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    let patterns: Vec<&str> = match war {
        WebAccessibleResources::Flat(paths) => paths.iter().map(String::as_str).collect(),
        WebAccessibleResources::Scoped(entries) => entries
            .iter()
            .flat_map(|e| e.resources.iter().map(String::as_str))
            .collect(),
    };

    for pattern in patterns {
        // Stands in for runtime-injected scripts; not a file on disk.
        if pattern == DYNAMIC_SCRIPTS_PLACEHOLDER {
            continue;
        }
        if has_glob_magic(pattern) {
            for path in expand_glob(src_dir, pattern) {
                if seen.insert(path.clone()) {
                    out.push(path);
                }
            }
        } else if seen.insert(pattern.to_string()) {
            out.push(pattern.to_string());
        }
    }
    out
}

fn has_glob_magic(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}

fn expand_glob(src_dir: &Path, pattern: &str) -> Vec<String> {
    let full = src_dir.join(pattern);
    let Some(full) = full.to_str() else {
        return Vec::new();
    };
    let Ok(paths) = glob::glob(full) else {
        return Vec::new();
    };
    let mut out: Vec<String> = paths
        .flatten()
        .filter_map(|p| {
            p.strip_prefix(src_dir)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    out.sort();
    out
}

fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_script_path(path: &str) -> bool {
    matches!(extension_of(path).as_str(), "js" | "mjs" | "ts" | "jsx" | "tsx")
}

fn is_html_path(path: &str) -> bool {
    matches!(extension_of(path).as_str(), "html" | "htm")
}

fn is_css_path(path: &str) -> bool {
    extension_of(path) == "css"
}

fn is_image_path(path: &str) -> bool {
    matches!(
        extension_of(path).as_str(),
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "bmp" | "ico" | "tif" | "tiff"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileKind;
    use pretty_assertions::assert_eq;

    fn kinds_by_name(refs: &[FileRef]) -> Vec<(String, FileKind)> {
        refs.iter()
            .map(|r| (r.file_name.clone(), r.kind))
            .collect()
    }

    #[test]
    fn derives_mv2_fields() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 2,
                "name": "t", "version": "1.0",
                "background": { "page": "bg.html", "scripts": ["bg.js"] },
                "content_scripts": [
                    { "js": ["ct.js"], "css": ["ct.css"], "matches": ["https://*/*"] }
                ],
                "browser_action": { "default_popup": "popup.html", "default_icon": "act.png" },
                "icons": { "16": "icon16.png" }
            }"#,
        )
        .unwrap();
        let refs = derive_files(&manifest, Path::new("/src"), SchemaVersion::V2);
        assert_eq!(
            kinds_by_name(&refs),
            vec![
                ("bg.js".to_string(), FileKind::BackgroundScript),
                ("ct.js".to_string(), FileKind::ContentScript),
                ("bg.html".to_string(), FileKind::Html),
                ("popup.html".to_string(), FileKind::Html),
                ("ct.css".to_string(), FileKind::Css),
                ("icon16.png".to_string(), FileKind::Image),
                ("act.png".to_string(), FileKind::Image),
            ]
        );
    }

    #[test]
    fn derives_mv3_fields() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "name": "t", "version": "1.0",
                "background": { "service_worker": "sw.ts" },
                "options_ui": { "page": "options.html" },
                "devtools_page": "devtools.html",
                "action": { "default_popup": "popup.html", "default_icon": { "16": "a16.png" } },
                "web_accessible_resources": [
                    { "resources": ["inject.js", "fonts/sans.woff2"], "matches": ["https://*/*"] }
                ]
            }"#,
        )
        .unwrap();
        let refs = derive_files(&manifest, Path::new("/src"), SchemaVersion::V3);
        assert_eq!(
            kinds_by_name(&refs),
            vec![
                ("sw.ts".to_string(), FileKind::BackgroundScript),
                ("inject.js".to_string(), FileKind::Module),
                ("options.html".to_string(), FileKind::Html),
                ("devtools.html".to_string(), FileKind::Html),
                ("popup.html".to_string(), FileKind::Html),
                ("a16.png".to_string(), FileKind::Image),
                ("fonts/sans.woff2".to_string(), FileKind::Raw),
            ]
        );
    }

    #[test]
    fn dedupes_by_identity_first_role_wins() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 2,
                "background": { "scripts": ["shared.js"] },
                "content_scripts": [
                    { "js": ["shared.js"], "matches": ["https://*/*"] }
                ]
            }"#,
        )
        .unwrap();
        let refs = derive_files(&manifest, Path::new("/src"), SchemaVersion::V2);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, FileKind::BackgroundScript);
    }

    #[test]
    fn dynamic_scripts_placeholder_is_not_a_file() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "web_accessible_resources": [
                    { "resources": ["<dynamic_scripts>", "inject.js"], "matches": ["https://*/*"] }
                ]
            }"#,
        )
        .unwrap();
        let refs = derive_files(&manifest, Path::new("/src"), SchemaVersion::V3);
        assert_eq!(
            kinds_by_name(&refs),
            vec![("inject.js".to_string(), FileKind::Module)]
        );
    }

    #[test]
    fn expands_war_globs_against_the_source_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/a.png"), b"a").unwrap();
        std::fs::write(dir.path().join("assets/b.png"), b"b").unwrap();
        std::fs::write(dir.path().join("assets/notes.txt"), b"n").unwrap();

        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 2,
                "web_accessible_resources": ["assets/*.png", "assets/notes.txt"]
            }"#,
        )
        .unwrap();
        let refs = derive_files(&manifest, dir.path(), SchemaVersion::V2);
        let mut names: Vec<(String, FileKind)> = kinds_by_name(&refs);
        names.sort();
        assert_eq!(
            names,
            vec![
                ("assets/a.png".to_string(), FileKind::Image),
                ("assets/b.png".to_string(), FileKind::Image),
                ("assets/notes.txt".to_string(), FileKind::Raw),
            ]
        );
    }
}
