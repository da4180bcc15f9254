// In-memory document model.
//
// A document is a list of paragraphs separated by blank lines in the
// stored form. All mutation is copy-on-write: `stage` produces a mutated
// copy plus the fragments describing the change, and the caller decides
// whether the copy ever reaches storage.

use redline_common::diff::{diff_paragraphs, ChangeFragment};
use redline_common::intent::EditIntent;
use redline_common::types::DocumentMetadata;
use sha2::{Digest, Sha256};

use crate::engine::search::{find_matches, TextMatch};
use crate::errors::OpError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    paragraphs: Vec<String>,
}

/// The result of staging an intent: the would-be document, the fragments a
/// preview shows, and the raw match list for ambiguity reporting.
#[derive(Debug, Clone)]
pub struct StagedEdit {
    pub document: TextDocument,
    pub fragments: Vec<ChangeFragment>,
    pub matches: Vec<TextMatch>,
}

impl TextDocument {
    /// Parse stored text into paragraphs. Blank lines separate paragraphs;
    /// single newlines inside a paragraph are soft wraps and survive.
    pub fn parse(content: &str) -> Self {
        let unified = content.replace("\r\n", "\n");
        let paragraphs = unified
            .split("\n\n")
            .map(|block| block.trim_matches('\n').to_string())
            .filter(|block| !block.is_empty())
            .collect();
        Self { paragraphs }
    }

    pub fn from_paragraphs(paragraphs: Vec<String>) -> Self {
        Self { paragraphs }
    }

    /// Stored form: paragraphs joined by blank lines, trailing newline.
    pub fn render(&self) -> String {
        if self.paragraphs.is_empty() {
            return String::new();
        }
        let mut out = self.paragraphs.join("\n\n");
        out.push('\n');
        out
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Hex SHA-256 of the stored form. Used for preview freshness checks.
    pub fn content_hash(&self) -> String {
        let digest = Sha256::digest(self.render().as_bytes());
        format!("{digest:x}")
    }

    pub fn metadata(&self, path: &str) -> DocumentMetadata {
        DocumentMetadata {
            path: path.to_string(),
            paragraph_count: self.paragraphs.len(),
            character_count: self.paragraphs.iter().map(|p| p.chars().count()).sum(),
            content_hash: self.content_hash(),
        }
    }

    /// Stage an intent against this document without touching it.
    pub fn stage(&self, intent: &EditIntent) -> Result<StagedEdit, OpError> {
        match intent {
            EditIntent::ReplaceText { find, replace, paragraph, occurrence, match_case } => {
                self.stage_replace(find, replace, *paragraph, *occurrence, *match_case)
            }
            EditIntent::SetParagraph { index, text } => {
                self.check_index(*index)?;
                let mut paragraphs = self.paragraphs.clone();
                paragraphs[*index] = text.clone();
                Ok(self.staged(paragraphs))
            }
            EditIntent::InsertParagraph { index, text } => {
                if *index > self.paragraphs.len() {
                    return Err(OpError::TargetOutOfRange {
                        index: *index,
                        count: self.paragraphs.len(),
                    });
                }
                let mut paragraphs = self.paragraphs.clone();
                paragraphs.insert(*index, text.clone());
                Ok(self.staged(paragraphs))
            }
            EditIntent::DeleteParagraph { index } => {
                self.check_index(*index)?;
                let mut paragraphs = self.paragraphs.clone();
                paragraphs.remove(*index);
                Ok(self.staged(paragraphs))
            }
        }
    }

    fn stage_replace(
        &self,
        find: &str,
        replace: &str,
        paragraph: Option<usize>,
        occurrence: Option<usize>,
        match_case: bool,
    ) -> Result<StagedEdit, OpError> {
        if let Some(index) = paragraph {
            self.check_index(index)?;
        }

        let matches = find_matches(&self.paragraphs, find, match_case, paragraph);

        let selected: Vec<&TextMatch> = match occurrence {
            Some(ordinal) => {
                // 1-based ordinal within the scoped match list.
                match matches.get(ordinal - 1) {
                    Some(m) => vec![m],
                    None => {
                        return Err(OpError::TargetOutOfRange {
                            index: ordinal,
                            count: matches.len(),
                        });
                    }
                }
            }
            None => matches.iter().collect(),
        };

        let mut paragraphs = self.paragraphs.clone();
        // Rightmost-first within each paragraph so earlier positions stay valid.
        for site in selected.iter().rev() {
            let chars: Vec<char> = paragraphs[site.paragraph_index].chars().collect();
            let mut rebuilt: String = chars[..site.position].iter().collect();
            rebuilt.push_str(replace);
            rebuilt.extend(&chars[site.position + site.length..]);
            paragraphs[site.paragraph_index] = rebuilt;
        }

        let mut staged = self.staged(paragraphs);
        staged.matches = matches;
        Ok(staged)
    }

    fn staged(&self, paragraphs: Vec<String>) -> StagedEdit {
        let fragments = diff_paragraphs(&self.paragraphs, &paragraphs);
        StagedEdit { document: TextDocument { paragraphs }, fragments, matches: Vec::new() }
    }

    fn check_index(&self, index: usize) -> Result<(), OpError> {
        if index >= self.paragraphs.len() {
            return Err(OpError::TargetOutOfRange { index, count: self.paragraphs.len() });
        }
        Ok(())
    }
}
