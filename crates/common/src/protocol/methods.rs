// RPC method name constants — the tool-call contract exposed by the daemon.

// ── Daemon-internal ────────────────────────────────────────────────
pub const RPC_PING: &str = "rpc.ping";
pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";

// ── Handle lifecycle ───────────────────────────────────────────────
pub const OPEN_DOCUMENT_HANDLE: &str = "open_document_handle";
pub const LIST_OPEN_DOCUMENTS: &str = "list_open_documents";
pub const CLOSE_DOCUMENT_HANDLE: &str = "close_document_handle";

/// Session policy advertised by `list_open_documents`: opening the same
/// canonical path twice returns the existing handle instead of a new one.
pub const SESSION_POLICY: &str = "dedup_by_canonical_path";

// ── Staged mutation pipeline ───────────────────────────────────────
pub const PLAN_EDIT: &str = "plan_edit";
pub const PREVIEW_EDIT: &str = "preview_edit";
pub const APPLY_EDIT: &str = "apply_edit";

// ── Read-only views by handle ──────────────────────────────────────
pub const GET_DOCUMENT_METADATA: &str = "get_document_metadata";
pub const GET_DOCUMENT_PARAGRAPHS: &str = "get_document_paragraphs";
pub const GET_DOCUMENT_TABLES: &str = "get_document_tables";

/// All methods the daemon currently dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    RPC_PING,
    DAEMON_SHUTDOWN,
    OPEN_DOCUMENT_HANDLE,
    LIST_OPEN_DOCUMENTS,
    CLOSE_DOCUMENT_HANDLE,
    PLAN_EDIT,
    PREVIEW_EDIT,
    APPLY_EDIT,
    GET_DOCUMENT_METADATA,
    GET_DOCUMENT_PARAGRAPHS,
    GET_DOCUMENT_TABLES,
];
