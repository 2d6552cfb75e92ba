//! Reference extraction.
//!
//! Each container kind (manifest, HTML, CSS) has an extractor that returns
//! a typed, order-preserving list of [`FileRef`]s. A malformed container
//! fails only its own file; siblings keep going.

pub mod css;
pub mod html;
pub mod manifest;

pub use css::extract_css_imports;
pub use html::{resolve_html_refs, HtmlParser, HtmlRefs, RegexHtmlParser};
pub use manifest::derive_files;
