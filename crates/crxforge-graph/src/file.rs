//! File identity and typing.
//!
//! Every discovered file is identified by its normalized absolute path and
//! carries one kind from a closed set. Classification is pure: it depends
//! only on the structural role the reference appeared in and the file
//! extension. The first classification wins; re-discovery under a
//! different role never re-types a file.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The closed set of file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    /// The root manifest.
    Manifest,
    /// An HTML page (popup, options, devtools, override).
    Html,
    /// A stylesheet.
    Css,
    /// An image (icon, favicon, embedded image).
    Image,
    /// A JSON data file (e.g. locale messages).
    Json,
    /// An opaque asset copied through unchanged (fonts, marked asset scripts).
    Raw,
    /// A script loaded by an HTML page.
    Script,
    /// A background script or service worker.
    BackgroundScript,
    /// A script injected into matching web pages.
    ContentScript,
    /// A script module reachable only through `web_accessible_resources`.
    Module,
}

impl FileKind {
    /// Returns the kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Manifest => "manifest",
            FileKind::Html => "html",
            FileKind::Css => "css",
            FileKind::Image => "image",
            FileKind::Json => "json",
            FileKind::Raw => "raw",
            FileKind::Script => "script",
            FileKind::BackgroundScript => "background-script",
            FileKind::ContentScript => "content-script",
            FileKind::Module => "module",
        }
    }

    /// True for kinds the external compiler bundles as script entry points.
    pub fn is_script(&self) -> bool {
        matches!(
            self,
            FileKind::Script
                | FileKind::BackgroundScript
                | FileKind::ContentScript
                | FileKind::Module
        )
    }

    /// True for kinds that never reference further files.
    ///
    /// CSS is not a leaf: `@import` references join the graph.
    pub fn is_leaf(&self) -> bool {
        matches!(self, FileKind::Image | FileKind::Json | FileKind::Raw)
    }

    /// Classifies a path by extension alone, for references with no
    /// structural role (glob-expanded `web_accessible_resources`).
    /// Anything outside the recognized buckets is raw (fonts, wasm, ...).
    pub fn from_extension(path: &Path) -> FileKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "js" | "mjs" | "ts" | "jsx" | "tsx" => FileKind::Module,
            "html" | "htm" => FileKind::Html,
            "css" => FileKind::Css,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "bmp" | "ico" | "tif" | "tiff" => {
                FileKind::Image
            }
            "json" => FileKind::Json,
            _ => FileKind::Raw,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The structural role a file reference appeared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefRole {
    /// `background.scripts[]` or `background.service_worker`.
    BackgroundScript,
    /// `content_scripts[].js[]`.
    ContentScriptJs,
    /// `content_scripts[].css[]`.
    ContentScriptCss,
    /// Any manifest-declared HTML page.
    Page,
    /// `icons`, action icons, or an HTML `<img>`/favicon.
    Icon,
    /// A `<script src>` in an HTML page.
    HtmlScript,
    /// A `<script data-asset>` in an HTML page, copied without bundling.
    AssetScript,
    /// A `<link rel="stylesheet">` or CSS `@import`.
    Stylesheet,
    /// A locale messages file.
    Locale,
    /// A `web_accessible_resources` path (typed by extension).
    WebAccessible,
}

/// Classifies a referenced path. Pure and total over the closed kind set.
pub fn classify(role: RefRole, path: &Path) -> FileKind {
    match role {
        RefRole::BackgroundScript => FileKind::BackgroundScript,
        RefRole::ContentScriptJs => FileKind::ContentScript,
        RefRole::ContentScriptCss | RefRole::Stylesheet => FileKind::Css,
        RefRole::Page => FileKind::Html,
        RefRole::Icon => FileKind::Image,
        RefRole::HtmlScript => FileKind::Script,
        RefRole::AssetScript => FileKind::Raw,
        RefRole::Locale => FileKind::Json,
        RefRole::WebAccessible => FileKind::from_extension(path),
    }
}

/// A typed reference to a file discovered inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// The classified kind.
    pub kind: FileKind,
    /// Canonical identity: normalized absolute path.
    pub id: PathBuf,
    /// Source-root-relative output path with forward slashes.
    pub file_name: String,
}

impl FileRef {
    /// Builds a reference for `path` resolved against `src_dir`.
    pub fn resolved(kind: FileKind, src_dir: &Path, path: &str) -> Self {
        let id = normalize_path(&src_dir.join(path));
        let file_name = output_name(src_dir, &id);
        Self {
            kind,
            id,
            file_name,
        }
    }
}

/// Normalizes a path lexically: strips `.` components and folds `..` into
/// the preceding component. No filesystem access.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Derives the output-relative file name for `id` under `root`, with
/// forward slashes regardless of platform.
pub fn output_name(root: &Path, id: &Path) -> String {
    let rel = id.strip_prefix(root).unwrap_or(id);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}
