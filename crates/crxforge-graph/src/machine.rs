//! Per-file lifecycle machine.
//!
//! Every discovered file advances through a fixed set of states:
//!
//! ```text
//! pending -> parsing -> spawning -> awaiting-completion -> ready
//! ```
//!
//! `excluded` and `error` are reachable from any pre-ready state, `stale`
//! only from `ready` (watch invalidation), and `cancelled` from any
//! non-settled state (abort). Leaf kinds skip straight from parsing to
//! awaiting-completion since they spawn no children.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bundle::RefId;
use crate::file::FileKind;

/// Lifecycle state of one file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Created, not yet read.
    Pending,
    /// Contents read, references being extracted.
    Parsing,
    /// Children spawned, waiting for them to settle.
    Spawning,
    /// Registered with the compiler, waiting for an output name.
    AwaitingCompletion,
    /// Settled with an output.
    Ready,
    /// Filtered out by build options; settled without an output.
    Excluded,
    /// Settled with a per-file failure.
    Error,
    /// Was ready, then invalidated; will re-parse in place.
    Stale,
    /// Aborted mid-flight.
    Cancelled,
}

impl FileState {
    /// True once the node no longer advances on its own: it either holds
    /// an output, was filtered, failed, or was aborted.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            FileState::Ready | FileState::Excluded | FileState::Error | FileState::Cancelled
        )
    }

    /// True for states no event can leave. `Ready` is settled but not
    /// terminal: a watch invalidation moves it to `Stale`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Excluded | FileState::Error | FileState::Cancelled
        )
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileState::Pending => "pending",
            FileState::Parsing => "parsing",
            FileState::Spawning => "spawning",
            FileState::AwaitingCompletion => "awaiting-completion",
            FileState::Ready => "ready",
            FileState::Excluded => "excluded",
            FileState::Error => "error",
            FileState::Stale => "stale",
            FileState::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One file in the build graph.
///
/// Identity (`id`) is assigned once at creation and never reused within a
/// generation. Re-discovery under another parent only adds a `dependents`
/// edge; `children` is finalized on parse success and preserves discovery
/// order.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Normalized absolute path; the identity key.
    pub id: PathBuf,
    /// Source-root-relative output path with forward slashes.
    pub file_name: String,
    /// Classified kind, fixed at first discovery.
    pub kind: FileKind,
    /// Cached contents, present once parsed.
    pub source: Option<Arc<Vec<u8>>>,
    /// Every parent that references this file.
    pub dependents: BTreeSet<PathBuf>,
    /// Files this node references, in discovery order.
    pub children: Vec<PathBuf>,
    /// Compiler registration, set when the node is handed over.
    pub ref_id: Option<RefId>,
    /// Final output path, set on compiler completion.
    pub output_file_name: Option<String>,
    /// Current lifecycle state.
    pub state: FileState,
    /// Failure message when `state == Error`.
    pub error: Option<String>,
}

impl FileNode {
    /// Creates a pending node.
    pub fn new(id: PathBuf, file_name: String, kind: FileKind) -> Self {
        Self {
            id,
            file_name,
            kind,
            source: None,
            dependents: BTreeSet::new(),
            children: Vec::new(),
            ref_id: None,
            output_file_name: None,
            state: FileState::Pending,
            error: None,
        }
    }

    /// Pending or stale node starts reading. Returns false from any other
    /// state so a duplicate event is a no-op.
    pub fn begin_parse(&mut self) -> bool {
        if matches!(self.state, FileState::Pending | FileState::Stale) {
            self.state = FileState::Parsing;
            true
        } else {
            false
        }
    }

    /// Parse succeeded; children recorded in discovery order.
    pub fn spawn(&mut self, source: Arc<Vec<u8>>, children: Vec<PathBuf>) -> bool {
        if self.state != FileState::Parsing {
            return false;
        }
        self.source = Some(source);
        self.children = children;
        self.state = if self.children.is_empty() {
            FileState::AwaitingCompletion
        } else {
            FileState::Spawning
        };
        true
    }

    /// Every child has settled; the node now only waits on the compiler.
    pub fn await_completion(&mut self) -> bool {
        if self.state == FileState::Spawning {
            self.state = FileState::AwaitingCompletion;
            true
        } else {
            false
        }
    }

    /// Compiler completion assigns the final output name.
    pub fn complete(&mut self, output_file_name: String) -> bool {
        if self.state != FileState::AwaitingCompletion {
            return false;
        }
        self.output_file_name = Some(output_file_name);
        self.state = FileState::Ready;
        true
    }

    /// Build options filtered this node out before it settled.
    pub fn exclude(&mut self) -> bool {
        if self.state.is_settled() {
            return false;
        }
        self.state = FileState::Excluded;
        true
    }

    /// Per-file failure: the node settles as `error` with no children.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.state.is_settled() {
            return false;
        }
        self.children.clear();
        self.error = Some(message.into());
        self.state = FileState::Error;
        true
    }

    /// Watch invalidation on a ready node.
    pub fn mark_stale(&mut self) -> bool {
        if self.state != FileState::Ready {
            return false;
        }
        self.state = FileState::Stale;
        self.source = None;
        self.output_file_name = None;
        true
    }

    /// Abort: cancels anything not yet settled.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_settled() {
            return false;
        }
        self.state = FileState::Cancelled;
        true
    }
}
