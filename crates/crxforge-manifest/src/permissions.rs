//! Runtime permission derivation.
//!
//! Bundled script output is scanned against a fixed ordered table of
//! `(permission, detector)` rules; the union of all matching names across
//! all chunks is the derived permission set. The table is pure
//! configuration: every rule is independently testable and carries no
//! state.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// How a rule recognizes its permission in compiled code.
enum Detector {
    /// The chrome API namespace is used, e.g. `chrome.alarms.`.
    Namespace(&'static str),
    /// A custom predicate over the chunk code.
    Custom(fn(&str) -> bool),
}

/// One entry of the permission detection table.
pub struct PermissionRule {
    /// The permission name emitted into the manifest.
    pub name: &'static str,
    detector: Detector,
}

impl PermissionRule {
    /// Returns true if the compiled code requires this permission.
    pub fn matches(&self, code: &str) -> bool {
        match self.detector {
            Detector::Namespace(needle) => code.contains(needle),
            Detector::Custom(f) => f(code),
        }
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("invalid permission detector pattern"))
}

fn detect_clipboard_read(code: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"document\.execCommand\(\s*['"]paste['"]"#).is_match(code)
}

fn detect_clipboard_write(code: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"document\.execCommand\(\s*['"](copy|cut)['"]"#).is_match(code)
}

fn detect_geolocation(code: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"navigator\.geolocation").is_match(code)
}

fn detect_native_messaging(code: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"chrome\.runtime\.(connectNative|sendNativeMessage)").is_match(code)
}

fn detect_web_request_blocking(code: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    code.contains("chrome.webRequest.") && regex(&RE, r#"['"]blocking['"]"#).is_match(code)
}

/// The fixed, ordered permission detection table.
static RULES: &[PermissionRule] = &[
    PermissionRule {
        name: "alarms",
        detector: Detector::Namespace("chrome.alarms."),
    },
    PermissionRule {
        name: "bookmarks",
        detector: Detector::Namespace("chrome.bookmarks."),
    },
    PermissionRule {
        name: "browsingData",
        detector: Detector::Namespace("chrome.browsingData."),
    },
    PermissionRule {
        name: "clipboardRead",
        detector: Detector::Custom(detect_clipboard_read),
    },
    PermissionRule {
        name: "clipboardWrite",
        detector: Detector::Custom(detect_clipboard_write),
    },
    PermissionRule {
        name: "contextMenus",
        detector: Detector::Namespace("chrome.contextMenus."),
    },
    PermissionRule {
        name: "cookies",
        detector: Detector::Namespace("chrome.cookies."),
    },
    PermissionRule {
        name: "downloads",
        detector: Detector::Namespace("chrome.downloads."),
    },
    PermissionRule {
        name: "gcm",
        detector: Detector::Namespace("chrome.gcm."),
    },
    PermissionRule {
        name: "geolocation",
        detector: Detector::Custom(detect_geolocation),
    },
    PermissionRule {
        name: "history",
        detector: Detector::Namespace("chrome.history."),
    },
    PermissionRule {
        name: "identity",
        detector: Detector::Namespace("chrome.identity."),
    },
    PermissionRule {
        name: "idle",
        detector: Detector::Namespace("chrome.idle."),
    },
    PermissionRule {
        name: "management",
        detector: Detector::Namespace("chrome.management."),
    },
    PermissionRule {
        name: "nativeMessaging",
        detector: Detector::Custom(detect_native_messaging),
    },
    PermissionRule {
        name: "notifications",
        detector: Detector::Namespace("chrome.notifications."),
    },
    PermissionRule {
        name: "power",
        detector: Detector::Namespace("chrome.power."),
    },
    PermissionRule {
        name: "privacy",
        detector: Detector::Namespace("chrome.privacy."),
    },
    PermissionRule {
        name: "proxy",
        detector: Detector::Namespace("chrome.proxy."),
    },
    PermissionRule {
        name: "sessions",
        detector: Detector::Namespace("chrome.sessions."),
    },
    PermissionRule {
        name: "storage",
        detector: Detector::Namespace("chrome.storage."),
    },
    PermissionRule {
        name: "topSites",
        detector: Detector::Namespace("chrome.topSites."),
    },
    PermissionRule {
        name: "tts",
        detector: Detector::Namespace("chrome.tts."),
    },
    PermissionRule {
        name: "webNavigation",
        detector: Detector::Namespace("chrome.webNavigation."),
    },
    PermissionRule {
        name: "webRequest",
        detector: Detector::Namespace("chrome.webRequest."),
    },
    PermissionRule {
        name: "webRequestBlocking",
        detector: Detector::Custom(detect_web_request_blocking),
    },
];

/// Returns the full permission detection table in scan order.
pub fn rules() -> &'static [PermissionRule] {
    RULES
}

/// Derives the permission set required by one compiled chunk.
pub fn derive_permissions(code: &str) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    derive_permissions_into(&mut set, code);
    set
}

/// Adds the permissions required by one compiled chunk to an existing set.
///
/// Calling this once per chunk unions the detections across the bundle; a
/// pattern appearing in multiple chunks contributes its name once.
pub fn derive_permissions_into(set: &mut BTreeSet<String>, code: &str) {
    for rule in RULES {
        if rule.matches(code) {
            set.insert(rule.name.to_string());
        }
    }
}

/// Merges declared and derived permissions.
///
/// The result is the sorted, deduplicated union. A declared entry of the
/// form `"!name"` excludes `name` from the result and is itself dropped,
/// which lets a manifest veto a false-positive detection.
pub fn combine_permissions<I, S>(declared: I, derived: &BTreeSet<String>) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut excluded: BTreeSet<String> = BTreeSet::new();
    let mut combined: BTreeSet<String> = derived.clone();

    for perm in declared {
        let perm = perm.as_ref();
        if let Some(name) = perm.strip_prefix('!') {
            excluded.insert(name.to_string());
        } else {
            combined.insert(perm.to_string());
        }
    }

    combined
        .into_iter()
        .filter(|p| !excluded.contains(p))
        .collect()
}
