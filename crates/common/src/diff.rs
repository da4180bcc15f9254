// Paragraph-level diffing for edit previews.
//
// Previews report what an apply would change as a list of fragments, one
// per affected paragraph. The diff runs over whole paragraphs (the unit
// the pipeline mutates), not characters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Replaced,
    Inserted,
    Deleted,
}

/// One paragraph's worth of pending change. `paragraph_index` refers to
/// the pre-mutation document for replacements and deletions, and to the
/// post-mutation position for insertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFragment {
    pub paragraph_index: usize,
    pub kind: FragmentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl ChangeFragment {
    pub fn replaced(paragraph_index: usize, before: String, after: String) -> Self {
        Self { paragraph_index, kind: FragmentKind::Replaced, before: Some(before), after: Some(after) }
    }

    pub fn inserted(paragraph_index: usize, after: String) -> Self {
        Self { paragraph_index, kind: FragmentKind::Inserted, before: None, after: Some(after) }
    }

    pub fn deleted(paragraph_index: usize, before: String) -> Self {
        Self { paragraph_index, kind: FragmentKind::Deleted, before: Some(before), after: None }
    }
}

/// Diff two paragraph lists into change fragments.
///
/// Strips the longest common prefix and suffix, then pairs the remaining
/// middle positionally: overlapping positions become replacements, excess
/// on either side becomes insertions or deletions. This matches how the
/// closed intent set actually mutates documents (single-site edits), so a
/// full edit-graph search buys nothing here.
pub fn diff_paragraphs(before: &[String], after: &[String]) -> Vec<ChangeFragment> {
    let prefix = before
        .iter()
        .zip(after.iter())
        .take_while(|(b, a)| b == a)
        .count();

    let max_suffix = before.len().min(after.len()) - prefix;
    let suffix = before
        .iter()
        .rev()
        .zip(after.iter().rev())
        .take_while(|(b, a)| b == a)
        .count()
        .min(max_suffix);

    let before_mid = &before[prefix..before.len() - suffix];
    let after_mid = &after[prefix..after.len() - suffix];

    let mut fragments = Vec::new();
    let paired = before_mid.len().min(after_mid.len());

    for i in 0..paired {
        fragments.push(ChangeFragment::replaced(
            prefix + i,
            before_mid[i].clone(),
            after_mid[i].clone(),
        ));
    }
    for (i, paragraph) in before_mid.iter().enumerate().skip(paired) {
        fragments.push(ChangeFragment::deleted(prefix + i, paragraph.clone()));
    }
    for (i, paragraph) in after_mid.iter().enumerate().skip(paired) {
        fragments.push(ChangeFragment::inserted(prefix + i, paragraph.clone()));
    }

    fragments
}
