//! Error types for manifest validation and processing.

use thiserror::Error;

/// Error codes for manifest validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Contract errors (E001-E009)
    /// E001: Unsupported manifest_version
    UnsupportedManifestVersion,
    /// E002: Missing extension name
    MissingName,
    /// E003: Missing extension version
    MissingVersion,
    /// E004: Invalid extension version format
    InvalidVersionFormat,

    // Component errors (E010-E019)
    /// E010: Content script declares no match patterns
    ContentScriptNoMatches,
    /// E011: Invalid match pattern
    InvalidMatchPattern,
    /// E012: Content script declares no js and no css
    EmptyContentScript,
    /// E013: Background section mixes schema-version fields
    BackgroundSchemaMismatch,

    // Web-accessible-resource errors (E020-E023)
    /// E020: web_accessible_resources shape does not match the schema version
    ResourcesSchemaMismatch,
    /// E021: v3 resource entry has no match patterns
    ResourceEntryNoMatches,
    /// E022: v3 resource entry lists no resources
    ResourceEntryEmpty,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::UnsupportedManifestVersion => "E001",
            ErrorCode::MissingName => "E002",
            ErrorCode::MissingVersion => "E003",
            ErrorCode::InvalidVersionFormat => "E004",
            ErrorCode::ContentScriptNoMatches => "E010",
            ErrorCode::InvalidMatchPattern => "E011",
            ErrorCode::EmptyContentScript => "E012",
            ErrorCode::BackgroundSchemaMismatch => "E013",
            ErrorCode::ResourcesSchemaMismatch => "E020",
            ErrorCode::ResourceEntryNoMatches => "E021",
            ErrorCode::ResourceEntryEmpty => "E022",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Warning codes for manifest validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    /// W001: Missing description
    MissingDescription,
    /// W002: No icons declared
    NoIcons,
    /// W003: Manifest v2 is a legacy schema
    LegacySchemaVersion,
    /// W004: Persistent background pages are deprecated
    PersistentBackground,
}

impl WarningCode {
    /// Returns the warning code string (e.g., "W001").
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::MissingDescription => "W001",
            WarningCode::NoIcons => "W002",
            WarningCode::LegacySchemaVersion => "W003",
            WarningCode::PersistentBackground => "W004",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error with code, message, and optional JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// JSON path to the problematic field (e.g., "content_scripts[0].matches").
    pub path: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation error with a JSON path.
    pub fn with_path(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validation warning with code, message, and optional JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The warning code.
    pub code: WarningCode,
    /// Human-readable warning message.
    pub message: String,
    /// JSON path to the problematic field.
    pub path: Option<String>,
}

impl ValidationWarning {
    /// Creates a new validation warning.
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation warning with a JSON path.
    pub fn with_path(
        code: WarningCode,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Top-level error type for manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest validation failed with one or more errors.
    #[error("manifest validation failed with {0} error(s)")]
    ValidationFailed(usize),

    /// The manifest_version field is not 2 or 3.
    #[error("unsupported manifest_version {0}: expected 2 or 3")]
    UnsupportedVersion(u32),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of manifest validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of validation warnings.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds a validation error.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Adds a validation warning.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Converts the result into a `Result`, failing if any errors were collected.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ManifestError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ManifestError::ValidationFailed(self.errors.len()))
        }
    }
}
