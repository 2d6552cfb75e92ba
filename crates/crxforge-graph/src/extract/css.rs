//! CSS `@import` extraction.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::file::{classify, FileRef, RefRole};

static IMPORT_RE: OnceLock<Regex> = OnceLock::new();

fn import_re() -> &'static Regex {
    IMPORT_RE.get_or_init(|| {
        Regex::new(r#"(?i)@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?[^;]*;"#)
            .expect("invalid regex pattern")
    })
}

fn is_external(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("data:")
        || lower.starts_with("//")
}

/// Extracts local `@import` targets from a stylesheet, resolved against
/// the sheet's own directory (or the root for `/x` references). Network
/// and data URLs are skipped.
pub fn extract_css_imports(source: &str, root: &Path, css_id: &Path) -> Vec<FileRef> {
    let css_dir = css_id.parent().unwrap_or(root);
    let mut out = Vec::new();
    for caps in import_re().captures_iter(source) {
        let raw = &caps[1];
        if is_external(raw) {
            continue;
        }
        let (base, path) = match raw.strip_prefix('/') {
            Some(rooted) => (root, rooted),
            None => (css_dir, raw),
        };
        let mut file_ref = FileRef::resolved(classify(RefRole::Stylesheet, Path::new(path)), base, path);
        file_ref.file_name = crate::file::output_name(root, &file_ref.id);
        out.push(file_ref);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_local_imports_only() {
        let css = r#"
            @import "reset.css";
            @import url(theme/dark.css);
            @import url("https://fonts.example.com/x.css");
            @import '/shared/base.css' screen;
            body { color: red; }
        "#;
        let refs = extract_css_imports(css, Path::new("/src"), Path::new("/src/styles/main.css"));
        let names: Vec<&str> = refs.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["styles/reset.css", "styles/theme/dark.css", "shared/base.css"]);
    }

    #[test]
    fn plain_stylesheet_has_no_imports() {
        let refs = extract_css_imports("a { b: c }", Path::new("/src"), Path::new("/src/a.css"));
        assert!(refs.is_empty());
    }
}
