//! Manifest validation logic.
//!
//! All errors are collected into one `ValidationResult` and reported
//! together rather than one at a time.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ErrorCode, ValidationError, ValidationResult, ValidationWarning, WarningCode};
use crate::manifest::{Manifest, SchemaVersion, WebAccessibleResources};

/// Regex pattern for extension versions: 1-4 dot-separated integers.
const VERSION_PATTERN: &str = r"^\d{1,9}(\.\d{1,9}){0,3}$";

/// Regex pattern for URL match patterns: `<all_urls>` or scheme://host/path.
const MATCH_PATTERN: &str = r"^(<all_urls>|(\*|https?|file|ftp|ws|wss)://(\*|(\*\.)?[^/*]+)?/.*)$";

static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
static MATCH_REGEX: OnceLock<Regex> = OnceLock::new();

fn version_regex() -> &'static Regex {
    VERSION_REGEX.get_or_init(|| Regex::new(VERSION_PATTERN).expect("invalid regex pattern"))
}

fn match_regex() -> &'static Regex {
    MATCH_REGEX.get_or_init(|| Regex::new(MATCH_PATTERN).expect("invalid regex pattern"))
}

/// Returns true if `pattern` is a well-formed URL match pattern.
pub fn is_valid_match_pattern(pattern: &str) -> bool {
    match_regex().is_match(pattern)
}

/// Validates a manifest body and returns the collected result.
pub fn validate_manifest(manifest: &Manifest) -> ValidationResult {
    let mut result = ValidationResult::default();

    validate_schema_version(manifest, &mut result);
    validate_identity(manifest, &mut result);
    validate_background(manifest, &mut result);
    validate_content_scripts(manifest, &mut result);
    validate_web_accessible_resources(manifest, &mut result);
    check_warnings(manifest, &mut result);

    result
}

fn validate_schema_version(manifest: &Manifest, result: &mut ValidationResult) {
    if manifest.schema_version().is_err() {
        result.add_error(ValidationError::with_path(
            ErrorCode::UnsupportedManifestVersion,
            format!(
                "manifest_version must be 2 or 3, got {}",
                manifest.manifest_version
            ),
            "manifest_version",
        ));
    }
}

fn validate_identity(manifest: &Manifest, result: &mut ValidationResult) {
    match manifest.name.as_deref() {
        None | Some("") => result.add_error(ValidationError::with_path(
            ErrorCode::MissingName,
            "the manifest must declare a non-empty name",
            "name",
        )),
        Some(_) => {}
    }

    match manifest.version.as_deref() {
        None | Some("") => result.add_error(ValidationError::with_path(
            ErrorCode::MissingVersion,
            "the manifest must declare a version",
            "version",
        )),
        Some(version) if !version_regex().is_match(version) => {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidVersionFormat,
                format!("version must be 1-4 dot-separated integers, got '{version}'"),
                "version",
            ));
        }
        Some(_) => {}
    }
}

fn validate_background(manifest: &Manifest, result: &mut ValidationResult) {
    let Some(background) = &manifest.background else {
        return;
    };
    let Ok(version) = manifest.schema_version() else {
        return;
    };

    let mismatch = match version {
        SchemaVersion::V2 => background.service_worker.is_some(),
        SchemaVersion::V3 => background.page.is_some() || !background.scripts.is_empty(),
    };
    if mismatch {
        result.add_error(ValidationError::with_path(
            ErrorCode::BackgroundSchemaMismatch,
            format!(
                "background for manifest {version} must use {}",
                match version {
                    SchemaVersion::V2 => "page or scripts, not service_worker",
                    SchemaVersion::V3 => "service_worker, not page or scripts",
                }
            ),
            "background",
        ));
    }
}

fn validate_content_scripts(manifest: &Manifest, result: &mut ValidationResult) {
    for (i, script) in manifest.content_scripts.iter().enumerate() {
        let matches = script.matches.as_deref().unwrap_or_default();
        if matches.is_empty() {
            result.add_error(ValidationError::with_path(
                ErrorCode::ContentScriptNoMatches,
                "content script declares no match patterns",
                format!("content_scripts[{i}].matches"),
            ));
        }
        for (j, pattern) in matches.iter().enumerate() {
            if !is_valid_match_pattern(pattern) {
                result.add_error(ValidationError::with_path(
                    ErrorCode::InvalidMatchPattern,
                    format!("'{pattern}' is not a valid match pattern"),
                    format!("content_scripts[{i}].matches[{j}]"),
                ));
            }
        }
        if script.js.is_empty() && script.css.is_empty() {
            result.add_error(ValidationError::with_path(
                ErrorCode::EmptyContentScript,
                "content script declares neither js nor css",
                format!("content_scripts[{i}]"),
            ));
        }
    }
}

fn validate_web_accessible_resources(manifest: &Manifest, result: &mut ValidationResult) {
    let Some(war) = &manifest.web_accessible_resources else {
        return;
    };
    let Ok(version) = manifest.schema_version() else {
        return;
    };

    match (version, war) {
        (SchemaVersion::V2, WebAccessibleResources::Scoped(entries)) if !entries.is_empty() => {
            result.add_error(ValidationError::with_path(
                ErrorCode::ResourcesSchemaMismatch,
                "manifest v2 web_accessible_resources must be a flat array of paths",
                "web_accessible_resources",
            ));
        }
        (SchemaVersion::V3, WebAccessibleResources::Flat(paths)) if !paths.is_empty() => {
            result.add_error(ValidationError::with_path(
                ErrorCode::ResourcesSchemaMismatch,
                "manifest v3 web_accessible_resources must be {resources, matches} entries",
                "web_accessible_resources",
            ));
        }
        (SchemaVersion::V3, WebAccessibleResources::Scoped(entries)) => {
            for (i, entry) in entries.iter().enumerate() {
                if entry.matches.is_empty() {
                    result.add_error(ValidationError::with_path(
                        ErrorCode::ResourceEntryNoMatches,
                        "resource entry declares no match patterns",
                        format!("web_accessible_resources[{i}].matches"),
                    ));
                }
                if entry.resources.is_empty() {
                    result.add_error(ValidationError::with_path(
                        ErrorCode::ResourceEntryEmpty,
                        "resource entry lists no resources",
                        format!("web_accessible_resources[{i}].resources"),
                    ));
                }
            }
        }
        _ => {}
    }
}

fn check_warnings(manifest: &Manifest, result: &mut ValidationResult) {
    if manifest.description.as_deref().unwrap_or("").is_empty() {
        result.add_warning(ValidationWarning::with_path(
            WarningCode::MissingDescription,
            "the manifest has no description",
            "description",
        ));
    }
    if manifest.icons.is_empty() {
        result.add_warning(ValidationWarning::with_path(
            WarningCode::NoIcons,
            "the manifest declares no icons",
            "icons",
        ));
    }
    if matches!(manifest.schema_version(), Ok(SchemaVersion::V2)) {
        result.add_warning(ValidationWarning::new(
            WarningCode::LegacySchemaVersion,
            "manifest v2 is a legacy schema; consider migrating to v3",
        ));
        if let Some(background) = &manifest.background {
            if background.persistent == Some(true) {
                result.add_warning(ValidationWarning::with_path(
                    WarningCode::PersistentBackground,
                    "persistent background pages are deprecated",
                    "background.persistent",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid_mv3() -> Manifest {
        Manifest::parse(
            r#"{
                "manifest_version": 3,
                "name": "test",
                "version": "1.0",
                "description": "a test extension",
                "icons": { "16": "icon16.png" },
                "background": { "service_worker": "sw.js" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn accepts_a_well_formed_manifest() {
        let result = validate_manifest(&valid_mv3());
        assert!(result.is_ok(), "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn collects_all_errors_together() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 5,
                "version": "not-a-version",
                "content_scripts": [ {} ]
            }"#,
        )
        .unwrap();
        let result = validate_manifest(&manifest);
        let codes: Vec<&str> = result.errors.iter().map(|e| e.code.code()).collect();
        assert_eq!(codes, vec!["E001", "E002", "E004", "E010", "E012"]);
    }

    #[test]
    fn rejects_background_schema_mismatch() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "name": "t",
                "version": "1.0",
                "background": { "scripts": ["bg.js"] }
            }"#,
        )
        .unwrap();
        let result = validate_manifest(&manifest);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::BackgroundSchemaMismatch));
    }

    #[test]
    fn rejects_resource_shape_mismatch() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "name": "t",
                "version": "1.0",
                "web_accessible_resources": ["assets/*.png"]
            }"#,
        )
        .unwrap();
        let result = validate_manifest(&manifest);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::ResourcesSchemaMismatch));
    }

    #[test]
    fn match_pattern_grammar() {
        assert!(is_valid_match_pattern("<all_urls>"));
        assert!(is_valid_match_pattern("https://*/*"));
        assert!(is_valid_match_pattern("*://*.example.com/path/*"));
        assert!(is_valid_match_pattern("file:///tmp/*"));
        assert!(!is_valid_match_pattern("example.com/*"));
        assert!(!is_valid_match_pattern("https://example.com"));
    }

    #[test]
    fn warns_on_legacy_and_missing_metadata() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 2,
                "name": "t",
                "version": "1.0",
                "background": { "page": "bg.html", "persistent": true }
            }"#,
        )
        .unwrap();
        let result = validate_manifest(&manifest);
        assert!(result.is_ok());
        let codes: Vec<&str> = result.warnings.iter().map(|w| w.code.code()).collect();
        assert_eq!(codes, vec!["W001", "W002", "W003", "W004"]);
    }
}
