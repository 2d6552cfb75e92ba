//! HTML reference extraction.
//!
//! HTML parsing is a black-box seam: a [`HtmlParser`] returns typed
//! reference lists and the extractor resolves them against the page's
//! directory. The default implementation is regex-based and covers the
//! references the pipeline cares about: `<script src>` (skipping network
//! and data URLs), asset-marked scripts, stylesheet links, images, and
//! favicons. A host can plug a real DOM parser through the trait.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::file::{classify, FileRef, RefRole};

/// Typed references found in one HTML page, in document order per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlRefs {
    /// `<script src>` values to bundle.
    pub scripts: Vec<String>,
    /// `<script src data-asset>` values copied through unchanged.
    pub asset_scripts: Vec<String>,
    /// `<link rel="stylesheet" href>` values.
    pub stylesheets: Vec<String>,
    /// `<img src>` and `<link rel="icon" href>` values.
    pub images: Vec<String>,
}

/// Black-box HTML parser seam.
pub trait HtmlParser: Send + Sync {
    /// Extracts typed references from HTML source.
    fn parse(&self, source: &str) -> Result<HtmlRefs, String>;
}

/// Regex-backed default parser.
#[derive(Debug, Default)]
pub struct RegexHtmlParser;

static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
static LINK_RE: OnceLock<Regex> = OnceLock::new();
static IMG_RE: OnceLock<Regex> = OnceLock::new();
static SRC_RE: OnceLock<Regex> = OnceLock::new();
static HREF_RE: OnceLock<Regex> = OnceLock::new();
static REL_RE: OnceLock<Regex> = OnceLock::new();

fn script_re() -> &'static Regex {
    SCRIPT_RE.get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>").expect("invalid regex pattern"))
}

fn link_re() -> &'static Regex {
    LINK_RE.get_or_init(|| Regex::new(r"(?is)<link\b[^>]*>").expect("invalid regex pattern"))
}

fn img_re() -> &'static Regex {
    IMG_RE.get_or_init(|| Regex::new(r"(?is)<img\b[^>]*>").expect("invalid regex pattern"))
}

fn src_re() -> &'static Regex {
    SRC_RE.get_or_init(|| {
        Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).expect("invalid regex pattern")
    })
}

fn href_re() -> &'static Regex {
    HREF_RE.get_or_init(|| {
        Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).expect("invalid regex pattern")
    })
}

fn rel_re() -> &'static Regex {
    REL_RE.get_or_init(|| {
        Regex::new(r#"(?i)\brel\s*=\s*["']([^"']+)["']"#).expect("invalid regex pattern")
    })
}

/// URLs loaded from the network or inlined as data are never build inputs.
fn is_external(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("data:")
        || lower.starts_with("//")
}

impl HtmlParser for RegexHtmlParser {
    fn parse(&self, source: &str) -> Result<HtmlRefs, String> {
        let mut refs = HtmlRefs::default();

        for tag in script_re().find_iter(source) {
            let tag = tag.as_str();
            let Some(src) = src_re().captures(tag).map(|c| c[1].to_string()) else {
                continue; // inline script
            };
            if is_external(&src) {
                continue;
            }
            if tag.to_ascii_lowercase().contains("data-asset") {
                refs.asset_scripts.push(src);
            } else {
                refs.scripts.push(src);
            }
        }

        for tag in link_re().find_iter(source) {
            let tag = tag.as_str();
            let Some(rel) = rel_re().captures(tag).map(|c| c[1].to_ascii_lowercase()) else {
                continue;
            };
            let Some(href) = href_re().captures(tag).map(|c| c[1].to_string()) else {
                continue;
            };
            if is_external(&href) {
                continue;
            }
            if rel == "stylesheet" {
                refs.stylesheets.push(href);
            } else if rel.split_whitespace().any(|r| r == "icon") {
                refs.images.push(href);
            }
        }

        for tag in img_re().find_iter(source) {
            if let Some(src) = src_re().captures(tag.as_str()).map(|c| c[1].to_string()) {
                if !is_external(&src) {
                    refs.images.push(src);
                }
            }
        }

        Ok(refs)
    }
}

/// Resolves parsed references against the page location.
///
/// Root-absolute references (`/x`) resolve against the source root; the
/// rest against the HTML file's own directory. The page may sit at any
/// depth below the root.
pub fn resolve_html_refs(refs: &HtmlRefs, root: &Path, html_id: &Path) -> Vec<FileRef> {
    let html_dir = html_id.parent().unwrap_or(root);

    let resolve = |role: RefRole, raw: &String| {
        let (base, path) = match raw.strip_prefix('/') {
            Some(rooted) => (root, rooted.to_string()),
            None => (html_dir, raw.clone()),
        };
        let mut file_ref = FileRef::resolved(classify(role, Path::new(&path)), base, &path);
        // file_name must stay root-relative even for nested pages.
        file_ref.file_name = crate::file::output_name(root, &file_ref.id);
        file_ref
    };

    let mut out = Vec::new();
    out.extend(refs.scripts.iter().map(|r| resolve(RefRole::HtmlScript, r)));
    out.extend(
        refs.asset_scripts
            .iter()
            .map(|r| resolve(RefRole::AssetScript, r)),
    );
    out.extend(
        refs.stylesheets
            .iter()
            .map(|r| resolve(RefRole::Stylesheet, r)),
    );
    out.extend(refs.images.iter().map(|r| resolve(RefRole::Icon, r)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileKind;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <link rel="stylesheet" href="popup.css">
    <link rel="icon" href="favicon.ico">
    <link rel="preload" href="ignored.woff2">
    <script src="popup.js"></script>
    <script src="https://cdn.example.com/lib.js"></script>
    <script src="legacy.js" data-asset="true"></script>
    <script>inline()</script>
  </head>
  <body>
    <img src="logo.png">
    <img src="data:image/png;base64,xyz">
  </body>
</html>"#;

    #[test]
    fn parses_typed_reference_buckets() {
        let refs = RegexHtmlParser.parse(PAGE).unwrap();
        assert_eq!(
            refs,
            HtmlRefs {
                scripts: vec!["popup.js".to_string()],
                asset_scripts: vec!["legacy.js".to_string()],
                stylesheets: vec!["popup.css".to_string()],
                images: vec!["favicon.ico".to_string(), "logo.png".to_string()],
            }
        );
    }

    #[test]
    fn resolves_relative_to_page_and_root() {
        let refs = HtmlRefs {
            scripts: vec!["app.js".to_string(), "/shared/boot.js".to_string()],
            ..HtmlRefs::default()
        };
        let resolved = resolve_html_refs(&refs, Path::new("/src"), Path::new("/src/pages/popup.html"));
        assert_eq!(resolved[0].id, Path::new("/src/pages/app.js"));
        assert_eq!(resolved[0].file_name, "pages/app.js");
        assert_eq!(resolved[0].kind, FileKind::Script);
        assert_eq!(resolved[1].id, Path::new("/src/shared/boot.js"));
        assert_eq!(resolved[1].file_name, "shared/boot.js");
    }
}
