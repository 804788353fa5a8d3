use crate::tokenizer::Token;

const PARAGRAPH_BREAK: &str = "\n\n";

/// Whether a token separates two paragraphs.
pub fn is_paragraph_break(token: &Token<'_>) -> bool {
    token.is_whitespace() && token.text.contains(PARAGRAPH_BREAK)
}

/// Index of the last token of the paragraph that contains `start`.
///
/// Scans forward from `start` and stops right before the first whitespace
/// token holding a blank line. Without such a token the paragraph runs to
/// the last token. `start` itself is never treated as a boundary.
pub fn paragraph_end(tokens: &[Token<'_>], start: usize) -> usize {
    let mut end = start;
    for token in tokens.iter().skip(start + 1) {
        if is_paragraph_break(token) {
            return token.index - 1;
        }
        end = token.index;
    }
    end
}
