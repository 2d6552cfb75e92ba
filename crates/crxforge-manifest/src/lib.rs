//! crxforge manifest library
//!
//! This crate provides the extension-manifest data model, collected
//! validation, canonical hashing, and the runtime permission rule table
//! used by the crxforge build pipeline.
//!
//! # Overview
//!
//! A manifest is a JSON document declaring an extension's components:
//! background scripts or service worker, content scripts, HTML pages,
//! icons, and web-accessible resources. Two schema versions exist (v2
//! legacy, v3 current) and several fields change shape between them; the
//! types here model both and fail fast on any other version.
//!
//! # Example
//!
//! ```
//! use crxforge_manifest::{validate_manifest, Manifest, SchemaVersion};
//!
//! let manifest = Manifest::parse(r#"{
//!     "manifest_version": 3,
//!     "name": "demo",
//!     "version": "1.0",
//!     "background": { "service_worker": "sw.js" }
//! }"#).unwrap();
//!
//! assert_eq!(manifest.schema_version().unwrap(), SchemaVersion::V3);
//! assert!(validate_manifest(&manifest).is_ok());
//! ```
//!
//! # Modules
//!
//! - [`error`]: error and warning types for validation
//! - [`manifest`]: the manifest data model
//! - [`validation`]: collected manifest validation
//! - [`hash`]: canonical JSON hashing for change detection
//! - [`permissions`]: the permission detection rule table

pub mod error;
pub mod hash;
pub mod manifest;
pub mod permissions;
pub mod validation;

// Re-export commonly used types at the crate root
pub use error::{
    ErrorCode, ManifestError, ValidationError, ValidationResult, ValidationWarning, WarningCode,
};
pub use hash::{canonical_value_hash, canonicalize_json, permission_set_hash};
pub use manifest::{
    Action, Background, ContentScript, IconValue, Manifest, OptionsUi, ResourceEntry,
    SchemaVersion, WebAccessibleResources,
};
pub use permissions::{
    combine_permissions, derive_permissions, derive_permissions_into, rules, PermissionRule,
};
pub use validation::{is_valid_match_pattern, validate_manifest};
