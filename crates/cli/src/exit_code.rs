// Consistent exit codes for the redline CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   3  = handle/plan/document not found
//   10 = daemon not reachable
//   12 = pipeline gate refused the operation
//   13 = network error

use std::process;

use serde_json::Value;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotFound = 3,
    DaemonDown = 10,
    Refused = 12,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        // Walk the error chain for typed errors we recognize.
        for cause in err.chain() {
            if let Some(failure) = cause.downcast_ref::<RpcFailure>() {
                return Self::from_rpc_code(failure.code.as_str());
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
                        Self::DaemonDown
                    }
                    std::io::ErrorKind::TimedOut => Self::Network,
                    _ => Self::Error,
                };
            }
        }

        // Check the display string for common patterns.
        let msg = format!("{err:#}");
        if msg.contains("daemon") && (msg.contains("connect") || msg.contains("socket")) {
            return Self::DaemonDown;
        }
        if msg.contains("timed out") {
            return Self::Network;
        }

        Self::Error
    }

    /// Map a daemon error code string to an exit code.
    pub fn from_rpc_code(code: &str) -> Self {
        match code {
            "INVALID_LOCATOR" | "PATH_ESCAPES_ROOT" | "UNSUPPORTED_INTENT"
            | "TARGET_OUT_OF_RANGE" => Self::Usage,

            "HANDLE_NOT_FOUND" | "PLAN_NOT_FOUND" | "DOCUMENT_NOT_FOUND" => Self::NotFound,

            "PREVIEW_REQUIRED" | "AMBIGUOUS_TARGET" | "UNSAFE_WILDCARD"
            | "CONFIRMATION_REQUIRED" | "PLAN_ALREADY_APPLIED" | "LEDGER_CONTENTION" => {
                Self::Refused
            }

            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

/// A typed daemon error that can be embedded in an `anyhow::Error` chain.
/// `code` is the stable string code from the error payload; `rpc_code` is
/// the numeric JSON-RPC code it rode in on.
#[derive(Debug)]
pub struct RpcFailure {
    pub code: String,
    pub rpc_code: i32,
    pub message: String,
    pub data: Value,
}

impl std::fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "daemon refused {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcFailure {}
