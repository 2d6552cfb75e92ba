//! Extension manifest types.
//!
//! The manifest is modeled with typed fields for everything the build
//! pipeline reads or rewrites; all other fields pass through untouched via
//! `#[serde(flatten)]` so the emitted manifest preserves them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Supported manifest schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Manifest v2 (legacy).
    V2,
    /// Manifest v3 (current).
    V3,
}

impl SchemaVersion {
    /// Returns the numeric manifest_version value.
    pub fn as_u32(&self) -> u32 {
        match self {
            SchemaVersion::V2 => 2,
            SchemaVersion::V3 => 3,
        }
    }

    /// Parses a manifest_version value, rejecting anything but 2 or 3.
    pub fn from_u32(v: u32) -> Result<Self, ManifestError> {
        match v {
            2 => Ok(SchemaVersion::V2),
            3 => Ok(SchemaVersion::V3),
            other => Err(ManifestError::UnsupportedVersion(other)),
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_u32())
    }
}

/// The `background` section; v2 uses `page`/`scripts`, v3 a single `service_worker`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Background {
    /// Background HTML page (v2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Background scripts (v2).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
    /// Service worker entry (v3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_worker: Option<String>,
    /// Module type marker (v3, set to "module" for ESM workers).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub worker_type: Option<String>,
    /// Persistent background page flag (v2, deprecated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
}

impl Background {
    /// Returns true if no background entry of any kind is declared.
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.scripts.is_empty() && self.service_worker.is_none()
    }
}

/// One `content_scripts[]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentScript {
    /// URL match patterns scoping where the script is injected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<String>>,
    /// Script files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub js: Vec<String>,
    /// Stylesheet files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css: Vec<String>,
    /// Unmodeled fields (run_at, all_frames, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An icon value: a single path or a size-keyed map of paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IconValue {
    /// One icon path for all sizes.
    Single(String),
    /// Paths keyed by pixel size.
    Sized(BTreeMap<String, String>),
}

impl IconValue {
    /// Returns every icon path in the value.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            IconValue::Single(p) => vec![p.as_str()],
            IconValue::Sized(map) => map.values().map(String::as_str).collect(),
        }
    }
}

/// An `action` (v3) or `browser_action`/`page_action` (v2) section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Popup HTML page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_popup: Option<String>,
    /// Icon path(s).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_icon: Option<IconValue>,
    /// Unmodeled fields (default_title, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `options_ui` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsUi {
    /// Options page path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One v3 `web_accessible_resources[]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Output paths exposed to matching pages.
    #[serde(default)]
    pub resources: Vec<String>,
    /// URL match patterns scoping the grant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,
    /// Unmodeled fields (use_dynamic_url, extension_ids, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResourceEntry {
    /// Creates an entry from match patterns and resources.
    pub fn new(matches: Vec<String>, resources: Vec<String>) -> Self {
        Self {
            matches,
            resources,
            extra: serde_json::Map::new(),
        }
    }
}

/// The `web_accessible_resources` field: a flat path list for v2,
/// match-pattern-scoped entries for v3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebAccessibleResources {
    /// v2: flat array of paths or glob patterns.
    Flat(Vec<String>),
    /// v3: array of `{resources, matches}` entries.
    Scoped(Vec<ResourceEntry>),
}

impl WebAccessibleResources {
    /// Returns true if the field would serialize as an empty array.
    pub fn is_empty(&self) -> bool {
        match self {
            WebAccessibleResources::Flat(v) => v.is_empty(),
            WebAccessibleResources::Scoped(v) => v.is_empty(),
        }
    }

    /// Returns every declared resource path or pattern, ignoring scoping.
    pub fn resource_patterns(&self) -> Vec<&str> {
        match self {
            WebAccessibleResources::Flat(v) => v.iter().map(String::as_str).collect(),
            WebAccessibleResources::Scoped(v) => v
                .iter()
                .flat_map(|e| e.resources.iter().map(String::as_str))
                .collect(),
        }
    }
}

/// An extension manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version; must be 2 or 3.
    pub manifest_version: u32,
    /// Extension name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extension version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Extension description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Background page/scripts/service worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Background>,
    /// Declared content scripts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_scripts: Vec<ContentScript>,
    /// Options page (legacy top-level form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_page: Option<String>,
    /// Options UI section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_ui: Option<OptionsUi>,
    /// Devtools page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtools_page: Option<String>,
    /// Toolbar action (v3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Browser action (v2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_action: Option<Action>,
    /// Page action (v2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_action: Option<Action>,
    /// Extension icons keyed by size.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub icons: BTreeMap<String, String>,
    /// Built-in page overrides (newtab, bookmarks, history).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub chrome_url_overrides: BTreeMap<String, String>,
    /// Web-accessible resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_accessible_resources: Option<WebAccessibleResources>,
    /// Declared runtime permissions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// Declared host permissions (v3).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_permissions: Vec<String>,
    /// Public key for a stable extension id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// All fields the pipeline does not touch.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Parses a manifest from JSON text.
    pub fn parse(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        Ok(manifest)
    }

    /// Parses a manifest from raw bytes.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_slice(bytes)?;
        Ok(manifest)
    }

    /// Returns the schema version, failing fast on anything but 2 or 3.
    pub fn schema_version(&self) -> Result<SchemaVersion, ManifestError> {
        SchemaVersion::from_u32(self.manifest_version)
    }

    /// Serializes the manifest to a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value, ManifestError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serializes the manifest to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns every match pattern declared by content scripts, deduplicated
    /// in declaration order.
    pub fn content_script_matches(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut patterns = Vec::new();
        for script in &self.content_scripts {
            for m in script.matches.iter().flatten() {
                if seen.insert(m.clone()) {
                    patterns.push(m.clone());
                }
            }
        }
        patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_mv2_manifest() {
        let json = r#"{
            "manifest_version": 2,
            "name": "test",
            "version": "1.0.0",
            "background": { "scripts": ["bg.js"] },
            "content_scripts": [
                { "js": ["ct.js"], "matches": ["https://*/*"] }
            ],
            "icons": { "16": "icon16.png" },
            "web_accessible_resources": ["assets/*.png"]
        }"#;
        let manifest = Manifest::parse(json).unwrap();
        assert_eq!(manifest.schema_version().unwrap(), SchemaVersion::V2);
        assert_eq!(manifest.background.as_ref().unwrap().scripts, vec!["bg.js"]);
        assert_eq!(
            manifest.web_accessible_resources,
            Some(WebAccessibleResources::Flat(vec![
                "assets/*.png".to_string()
            ]))
        );
    }

    #[test]
    fn parses_mv3_manifest_with_scoped_resources() {
        let json = r#"{
            "manifest_version": 3,
            "name": "test",
            "version": "1.0.0",
            "background": { "service_worker": "sw.js" },
            "web_accessible_resources": [
                { "resources": ["chunks/*.js"], "matches": ["https://example.com/*"] }
            ]
        }"#;
        let manifest = Manifest::parse(json).unwrap();
        assert_eq!(manifest.schema_version().unwrap(), SchemaVersion::V3);
        match manifest.web_accessible_resources.as_ref().unwrap() {
            WebAccessibleResources::Scoped(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].matches, vec!["https://example.com/*"]);
            }
            other => panic!("expected scoped resources, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unsupported_schema_version() {
        let json = r#"{ "manifest_version": 4 }"#;
        let manifest = Manifest::parse(json).unwrap();
        assert!(matches!(
            manifest.schema_version(),
            Err(ManifestError::UnsupportedVersion(4))
        ));
    }

    #[test]
    fn unknown_fields_round_trip() {
        let json = r#"{
            "manifest_version": 3,
            "name": "test",
            "version": "0.1.0",
            "default_locale": "en",
            "minimum_chrome_version": "100"
        }"#;
        let manifest = Manifest::parse(json).unwrap();
        let value = manifest.to_value().unwrap();
        assert_eq!(value["default_locale"], "en");
        assert_eq!(value["minimum_chrome_version"], "100");
    }

    #[test]
    fn action_icon_accepts_string_and_map() {
        let json = r#"{
            "manifest_version": 2,
            "browser_action": { "default_icon": "icon.png" },
            "page_action": { "default_icon": { "16": "a.png", "32": "b.png" } }
        }"#;
        let manifest = Manifest::parse(json).unwrap();
        let browser = manifest.browser_action.unwrap();
        let page = manifest.page_action.unwrap();
        assert_eq!(browser.default_icon.unwrap().paths(), vec!["icon.png"]);
        assert_eq!(page.default_icon.unwrap().paths(), vec!["a.png", "b.png"]);
    }
}
