// Preview rendering: diff fragments, ambiguity candidates, safety score.

use redline_common::intent::EditIntent;
use redline_common::types::{AmbiguityCandidate, PreviewReport};
use uuid::Uuid;

use crate::engine::document::{StagedEdit, TextDocument};

/// Render a preview report from a staged edit.
///
/// The safety score is the fraction of the document's paragraphs the apply
/// would touch, clamped to [0, 1]. The content hash records the document
/// the preview was computed against; apply re-checks it for freshness.
pub fn render_preview(
    plan_id: Uuid,
    intent: &EditIntent,
    document: &TextDocument,
    staged: &StagedEdit,
    preview_seq: u64,
) -> PreviewReport {
    let candidates: Vec<AmbiguityCandidate> = staged
        .matches
        .iter()
        .map(|site| AmbiguityCandidate {
            paragraph_index: site.paragraph_index,
            position: site.position,
            context: site.context.clone(),
        })
        .collect();

    let ambiguous = candidates.len() > 1 && !intent.is_disambiguated();

    PreviewReport {
        plan_id,
        preview_seq,
        fragments: staged.fragments.clone(),
        candidates,
        ambiguous,
        safety_score: safety_score(staged, document.paragraph_count()),
        content_hash: document.content_hash(),
    }
}

fn safety_score(staged: &StagedEdit, paragraph_count: usize) -> f64 {
    if paragraph_count == 0 {
        // Inserting into an empty document touches everything it will have.
        return if staged.fragments.is_empty() { 0.0 } else { 1.0 };
    }
    let mut touched: Vec<usize> = staged.fragments.iter().map(|f| f.paragraph_index).collect();
    touched.sort_unstable();
    touched.dedup();
    (touched.len() as f64 / paragraph_count as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(paragraphs: &[&str]) -> TextDocument {
        TextDocument::from_paragraphs(paragraphs.iter().map(|s| s.to_string()).collect())
    }

    fn replace_all(find: &str, rep: &str) -> EditIntent {
        EditIntent::ReplaceText {
            find: find.to_string(),
            replace: rep.to_string(),
            paragraph: None,
            occurrence: None,
            match_case: true,
        }
    }

    #[test]
    fn single_match_is_not_ambiguous() {
        let base = doc(&["The 2025 budget.", "Unrelated."]);
        let intent = replace_all("2025", "2026");
        let staged = base.stage(&intent).expect("stage should succeed");
        let report = render_preview(Uuid::new_v4(), &intent, &base, &staged, 1);

        assert!(!report.ambiguous);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.fragments.len(), 1);
        assert_eq!(report.safety_score, 0.5);
    }

    #[test]
    fn two_matches_without_scope_are_ambiguous() {
        let base = doc(&["2025 first.", "2025 second.", "Nothing."]);
        let intent = replace_all("2025", "2026");
        let staged = base.stage(&intent).expect("stage should succeed");
        let report = render_preview(Uuid::new_v4(), &intent, &base, &staged, 1);

        assert!(report.ambiguous);
        assert_eq!(report.candidates.len(), 2);
    }

    #[test]
    fn scoped_intent_is_never_ambiguous() {
        let base = doc(&["2025 and 2025."]);
        let intent = EditIntent::ReplaceText {
            find: "2025".to_string(),
            replace: "2026".to_string(),
            paragraph: None,
            occurrence: Some(1),
            match_case: true,
        };
        let staged = base.stage(&intent).expect("stage should succeed");
        let report = render_preview(Uuid::new_v4(), &intent, &base, &staged, 1);

        assert!(!report.ambiguous);
        assert_eq!(report.candidates.len(), 2, "all sites still reported for context");
    }

    #[test]
    fn wildcard_touching_most_paragraphs_scores_high() {
        let paragraphs: Vec<String> = (0..20)
            .map(|i| if i == 0 { "untouched".to_string() } else { format!("item {i}") })
            .collect();
        let base = TextDocument::from_paragraphs(paragraphs);
        let intent = replace_all("item", "entry");
        let staged = base.stage(&intent).expect("stage should succeed");
        let report = render_preview(Uuid::new_v4(), &intent, &base, &staged, 1);

        assert_eq!(report.safety_score, 0.95);
    }

    #[test]
    fn score_is_bounded() {
        let base = doc(&[]);
        let intent = EditIntent::InsertParagraph { index: 0, text: "first".to_string() };
        let staged = base.stage(&intent).expect("stage should succeed");
        let report = render_preview(Uuid::new_v4(), &intent, &base, &staged, 1);
        assert_eq!(report.safety_score, 1.0);
    }

    #[test]
    fn hash_reflects_the_previewed_document() {
        let base = doc(&["content"]);
        let intent = replace_all("content", "changed");
        let staged = base.stage(&intent).expect("stage should succeed");
        let report = render_preview(Uuid::new_v4(), &intent, &base, &staged, 3);

        assert_eq!(report.content_hash, base.content_hash());
        assert_ne!(report.content_hash, staged.document.content_hash());
        assert_eq!(report.preview_seq, 3);
    }
}
