// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use crate::client::daemon_unavailable_exit_code;
use crate::exit_code::RpcFailure;

use serde::Serialize;
use std::io::{self, IsTerminal, Write};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
///
/// - `Human`: calls `human_fn` to produce a human-readable string.
/// - `Json`: serializes `value` as JSON.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Human => {
            writeln!(out, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut out, value).map_err(io::Error::other)?;
            writeln!(out)
        }
    }
}

/// Write a value to a provided writer (useful for testing).
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line =
                render_human_stderr_line("error", message, io::stderr().is_terminal(), ANSI_RED);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Write a warning to stderr in the selected format.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(
                "warning",
                message,
                io::stderr().is_terminal(),
                ANSI_YELLOW,
            );
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "warning": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, &code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (String, String) {
    if let Some(failure) = error.downcast_ref::<RpcFailure>() {
        return (failure.code.clone(), actionable_rpc_message(failure));
    }

    let message = format!("{error:#}");
    let lower = message.to_ascii_lowercase();

    if daemon_unavailable_exit_code(error).is_some()
        || (lower.contains("daemon")
            && lower.contains("socket")
            && (lower.contains("connection refused")
                || lower.contains("not found")
                || lower.contains("failed to connect")))
    {
        return (
            "DAEMON_NOT_RUNNING".into(),
            "Daemon is not running. Start it with: redlined".to_string(),
        );
    }

    if lower.contains("timed out") {
        return (
            "NETWORK_TIMEOUT".into(),
            "Could not reach daemon. Check if redlined is running: ps aux | grep redlined"
                .to_string(),
        );
    }

    ("RPC_ERROR".into(), message)
}

fn actionable_rpc_message(failure: &RpcFailure) -> String {
    match failure.code.as_str() {
        "PREVIEW_REQUIRED" => format!(
            "{}. Run: redline preview <plan-id>, review the fragments, then apply again.",
            failure.message
        ),
        "CONFIRMATION_REQUIRED" => {
            format!("{}. Re-run apply with --confirm.", failure.message)
        }
        "AMBIGUOUS_TARGET" => {
            let count = failure
                .data
                .get("candidates")
                .and_then(|c| c.as_array())
                .map(|c| c.len())
                .unwrap_or(0);
            format!(
                "{} ({count} candidate(s)). Narrow the plan with --paragraph or --occurrence.",
                failure.message
            )
        }
        "UNSAFE_WILDCARD" => format!(
            "{}. Narrow the match, or re-run apply with --override-unsafe to accept the blast radius.",
            failure.message
        ),
        "PLAN_ALREADY_APPLIED" => {
            format!("{}. Create a new plan for further edits.", failure.message)
        }
        "LEDGER_CONTENTION" => {
            format!("{}. Another apply with this idempotency key is in flight; retry shortly.", failure.message)
        }
        "DOCUMENT_NOT_FOUND" => {
            format!("{}. Check the path against the configured document root.", failure.message)
        }
        "HANDLE_NOT_FOUND" => {
            format!("{}. Run: redline ls to see open handles.", failure.message)
        }
        _ => failure.message.clone(),
    }
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}
