// Edit intents: the closed set of mutations a plan may carry.
//
// Serialized form is an internally tagged object (`"kind": "replace_text"`),
// with unknown kinds and unknown fields rejected at the deserialization
// boundary rather than deep inside the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntentError {
    #[error("find pattern must not be empty")]
    EmptyFind,

    #[error("paragraph text must not contain the paragraph separator")]
    EmbeddedSeparator,

    #[error("occurrence index must be 1-based")]
    ZeroOccurrence,
}

/// A single document mutation. The enum is closed: adding a new kind of
/// edit means adding a variant here, updating the preview renderer, and
/// updating the apply executor in the same change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum EditIntent {
    /// Replace occurrences of `find` with `replace`. Without `paragraph`
    /// or `occurrence` the intent targets every match in the document and
    /// will surface ambiguity when more than one exists.
    ReplaceText {
        find: String,
        replace: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        paragraph: Option<usize>,
        /// 1-based match ordinal within the selected scope.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        occurrence: Option<usize>,
        #[serde(default = "default_match_case")]
        match_case: bool,
    },

    /// Overwrite the full text of the paragraph at `index`.
    SetParagraph { index: usize, text: String },

    /// Insert a new paragraph before `index`; `index == paragraph_count`
    /// appends at the end.
    InsertParagraph { index: usize, text: String },

    /// Remove the paragraph at `index`.
    DeleteParagraph { index: usize },
}

fn default_match_case() -> bool {
    true
}

impl EditIntent {
    /// Structural validation that does not require the target document.
    pub fn validate(&self) -> Result<(), IntentError> {
        match self {
            EditIntent::ReplaceText { find, occurrence, .. } => {
                if find.is_empty() {
                    return Err(IntentError::EmptyFind);
                }
                if *occurrence == Some(0) {
                    return Err(IntentError::ZeroOccurrence);
                }
                Ok(())
            }
            EditIntent::SetParagraph { text, .. } | EditIntent::InsertParagraph { text, .. } => {
                if text.contains("\n\n") {
                    return Err(IntentError::EmbeddedSeparator);
                }
                Ok(())
            }
            EditIntent::DeleteParagraph { .. } => Ok(()),
        }
    }

    /// Whether the intent pins its target to a single site. Index-addressed
    /// intents always do; text replacement needs a paragraph or occurrence
    /// qualifier to count as disambiguated.
    pub fn is_disambiguated(&self) -> bool {
        match self {
            EditIntent::ReplaceText { paragraph, occurrence, .. } => {
                paragraph.is_some() || occurrence.is_some()
            }
            EditIntent::SetParagraph { .. }
            | EditIntent::InsertParagraph { .. }
            | EditIntent::DeleteParagraph { .. } => true,
        }
    }

    /// Stable name used in logs and audit rows.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EditIntent::ReplaceText { .. } => "replace_text",
            EditIntent::SetParagraph { .. } => "set_paragraph",
            EditIntent::InsertParagraph { .. } => "insert_paragraph",
            EditIntent::DeleteParagraph { .. } => "delete_paragraph",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_text_deserializes_with_defaults() {
        let intent: EditIntent =
            serde_json::from_str(r#"{"kind":"replace_text","find":"2025","replace":"2026"}"#)
                .expect("should deserialize minimal replace_text");
        match intent {
            EditIntent::ReplaceText { find, replace, paragraph, occurrence, match_case } => {
                assert_eq!(find, "2025");
                assert_eq!(replace, "2026");
                assert_eq!(paragraph, None);
                assert_eq!(occurrence, None);
                assert!(match_case);
            }
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = serde_json::from_str::<EditIntent>(r#"{"kind":"merge_cells","table":0}"#);
        assert!(result.is_err(), "unknown intent kinds must not deserialize");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<EditIntent>(
            r#"{"kind":"delete_paragraph","index":3,"cascade":true}"#,
        );
        assert!(result.is_err(), "unknown fields must not deserialize");
    }

    #[test]
    fn empty_find_fails_validation() {
        let intent = EditIntent::ReplaceText {
            find: String::new(),
            replace: "x".to_string(),
            paragraph: None,
            occurrence: None,
            match_case: true,
        };
        assert_eq!(intent.validate(), Err(IntentError::EmptyFind));
    }

    #[test]
    fn zero_occurrence_fails_validation() {
        let intent = EditIntent::ReplaceText {
            find: "a".to_string(),
            replace: "b".to_string(),
            paragraph: None,
            occurrence: Some(0),
            match_case: true,
        };
        assert_eq!(intent.validate(), Err(IntentError::ZeroOccurrence));
    }

    #[test]
    fn paragraph_text_with_separator_fails_validation() {
        let intent = EditIntent::SetParagraph { index: 0, text: "one\n\ntwo".to_string() };
        assert_eq!(intent.validate(), Err(IntentError::EmbeddedSeparator));
    }

    #[test]
    fn disambiguation_rules() {
        let bare = EditIntent::ReplaceText {
            find: "2025".to_string(),
            replace: "2026".to_string(),
            paragraph: None,
            occurrence: None,
            match_case: true,
        };
        assert!(!bare.is_disambiguated());

        let scoped = EditIntent::ReplaceText {
            find: "2025".to_string(),
            replace: "2026".to_string(),
            paragraph: Some(4),
            occurrence: None,
            match_case: true,
        };
        assert!(scoped.is_disambiguated());

        assert!(EditIntent::DeleteParagraph { index: 1 }.is_disambiguated());
    }

    #[test]
    fn round_trips_through_json() {
        let intent = EditIntent::InsertParagraph { index: 2, text: "New clause.".to_string() };
        let json = serde_json::to_string(&intent).expect("should serialize");
        assert!(json.contains(r#""kind":"insert_paragraph""#));
        let back: EditIntent = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back, intent);
    }
}
