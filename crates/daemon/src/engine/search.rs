// Plain-text match finding over document paragraphs.
//
// Matching works on character positions, not bytes, so positions reported
// to clients line up with what they see in the paragraphs view. Each match
// carries a short bracketed context window for human disambiguation.

/// Characters of context kept on each side of a match.
const CONTEXT_CHARS: usize = 20;

/// Hard cap on matches returned from a single scan.
pub const MAX_MATCHES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    pub paragraph_index: usize,
    /// Character offset of the match within its paragraph.
    pub position: usize,
    /// Match length in characters.
    pub length: usize,
    /// Surrounding text with the match bracketed.
    pub context: String,
}

/// Scan paragraphs for `needle`. `paragraph_scope` restricts the scan to a
/// single paragraph; callers validate the index before calling.
pub fn find_matches(
    paragraphs: &[String],
    needle: &str,
    match_case: bool,
    paragraph_scope: Option<usize>,
) -> Vec<TextMatch> {
    let needle_chars: Vec<char> = needle.chars().collect();
    if needle_chars.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for (paragraph_index, paragraph) in paragraphs.iter().enumerate() {
        if let Some(scope) = paragraph_scope {
            if paragraph_index != scope {
                continue;
            }
        }

        let haystack: Vec<char> = paragraph.chars().collect();
        let mut position = 0;
        while position + needle_chars.len() <= haystack.len() {
            if window_matches(&haystack[position..position + needle_chars.len()], &needle_chars, match_case)
            {
                matches.push(TextMatch {
                    paragraph_index,
                    position,
                    length: needle_chars.len(),
                    context: context_window(&haystack, position, needle_chars.len()),
                });
                if matches.len() >= MAX_MATCHES {
                    return matches;
                }
                position += needle_chars.len();
            } else {
                position += 1;
            }
        }
    }
    matches
}

fn window_matches(window: &[char], needle: &[char], match_case: bool) -> bool {
    window.iter().zip(needle.iter()).all(|(a, b)| {
        if match_case {
            a == b
        } else {
            a == b || a.to_lowercase().eq(b.to_lowercase())
        }
    })
}

fn context_window(haystack: &[char], position: usize, length: usize) -> String {
    let start = position.saturating_sub(CONTEXT_CHARS);
    let end = (position + length + CONTEXT_CHARS).min(haystack.len());

    let mut context = String::new();
    if start > 0 {
        context.push('…');
    }
    context.extend(&haystack[start..position]);
    context.push('[');
    context.extend(&haystack[position..position + length]);
    context.push(']');
    context.extend(&haystack[position + length..end]);
    if end < haystack.len() {
        context.push('…');
    }
    context
}
