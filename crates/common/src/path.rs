// Document path normalization: NFKC, traversal rejection, length cap.
//
// Locators carry workdir-relative paths. Normalization happens before any
// filesystem access so that sandbox containment checks operate on a single
// canonical spelling per document.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum allowed path length in characters after normalization.
const MAX_PATH_CHARS: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,

    #[error("path contains invalid component: {0}")]
    InvalidComponent(String),
}

/// Normalize a client-supplied document path.
///
/// Rules:
/// - Apply Unicode NFKC normalization
/// - Convert `\` separators to `/` and collapse repeats
/// - Strip leading and trailing `/`
/// - Reject `.` and `..` components, null bytes, and empty results
/// - Reject Windows drive-letter components (`C:`)
/// - Enforce the length cap after normalization
pub fn normalize_document_path(input: &str) -> Result<String, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }
    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let normalized: String = input.nfkc().collect();
    let unified = normalized.replace('\\', "/");

    let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();
    if components.is_empty() {
        return Err(PathError::Empty);
    }

    for component in &components {
        match *component {
            "." | ".." => return Err(PathError::Traversal((*component).to_string())),
            _ => {}
        }
        if component.trim().is_empty() {
            return Err(PathError::InvalidComponent("(whitespace-only component)".to_string()));
        }
        if is_drive_prefix(component) {
            return Err(PathError::InvalidComponent((*component).to_string()));
        }
    }

    let result = components.join("/");
    if result.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

fn is_drive_prefix(component: &str) -> bool {
    let mut chars = component.chars();
    matches!((chars.next(), chars.next(), chars.next()), (Some(letter), Some(':'), None) if letter.is_ascii_alphabetic())
}
