// Operation id constants — the catalog the daemon registers at startup.

// ── Documents ──────────────────────────────────────────────────────
pub const DOC_CREATE: &str = "doc.create";
pub const DOC_GET: &str = "doc.get";
pub const DOC_UPDATE: &str = "doc.update";
pub const DOC_DELETE: &str = "doc.delete";
pub const DOC_LIST: &str = "doc.list";
pub const DOC_EXPORT: &str = "doc.export";
pub const DOC_IMPORT: &str = "doc.import";

// ── Shares ─────────────────────────────────────────────────────────
pub const SHARE_CREATE: &str = "share.create";
pub const SHARE_REVOKE: &str = "share.revoke";
pub const SHARE_LIST: &str = "share.list";

// ── API keys ───────────────────────────────────────────────────────
pub const APIKEY_ISSUE: &str = "apikey.issue";
pub const APIKEY_REVOKE: &str = "apikey.revoke";

/// All operations the daemon currently registers.
pub const IMPLEMENTED_OPERATIONS: &[&str] = &[
    DOC_CREATE,
    DOC_GET,
    DOC_UPDATE,
    DOC_DELETE,
    DOC_LIST,
    DOC_EXPORT,
    DOC_IMPORT,
    SHARE_CREATE,
    SHARE_REVOKE,
    SHARE_LIST,
    APIKEY_ISSUE,
    APIKEY_REVOKE,
];

/// The operations whose handlers run as tracked asynchronous jobs.
pub const ASYNC_OPERATIONS: &[&str] = &[DOC_EXPORT, DOC_IMPORT];

// ── RPC methods (daemon socket) ────────────────────────────────────
pub const RPC_PING: &str = "rpc.ping";
pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";
/// The single editor-protocol command: one opaque string argument built
/// by `command::build_operation_command`.
pub const EXECUTE_OPERATION: &str = "folio.executeOperation";
pub const JOB_STATUS: &str = "job.status";
pub const JOB_CANCEL: &str = "job.cancel";
