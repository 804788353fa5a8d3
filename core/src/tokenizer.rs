use regex::Regex;
use std::sync::OnceLock;

fn whitespace_run() -> &'static Regex {
    static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();
    WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Whitespace,
}

/// A word or whitespace run borrowed from the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Position in the token sequence
    pub index: usize,
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of `text` within the document
    pub offset: usize,
}

impl Token<'_> {
    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }
}

/// Split text into alternating word and whitespace tokens.
///
/// Whitespace runs are kept as their own tokens so that joining the result
/// reproduces the input exactly. Empty tokens are never produced.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for run in whitespace_run().find_iter(text) {
        push_token(&mut tokens, text, cursor, run.start(), TokenKind::Word);
        push_token(&mut tokens, text, run.start(), run.end(), TokenKind::Whitespace);
        cursor = run.end();
    }
    push_token(&mut tokens, text, cursor, text.len(), TokenKind::Word);

    tokens
}

fn push_token<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str, start: usize, end: usize, kind: TokenKind) {
    if start < end {
        tokens.push(Token {
            index: tokens.len(),
            kind,
            text: &text[start..end],
            offset: start,
        });
    }
}

/// Concatenate tokens back into a string.
pub fn join(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(|t| t.text).collect()
}

/// Inclusive range of token indices, always normalized so `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

impl TokenRange {
    pub fn new(a: usize, b: usize) -> Self {
        TokenRange {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn single(index: usize) -> Self {
        TokenRange {
            start: index,
            end: index,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    /// Reconstruct the text covered by this range, or `None` when the range
    /// reaches past the end of `tokens`.
    pub fn slice(&self, tokens: &[Token<'_>]) -> Option<String> {
        tokens.get(self.start..=self.end).map(join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts<'a>(tokens: &[Token<'a>]) -> Vec<&'a str> {
        tokens.iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_round_trip_preserves_whitespace() {
        let inputs = [
            "",
            " ",
            "word",
            "  leading",
            "trailing  ",
            "a  b\t\tc\n\nd",
            "\n\nparagraph one\n\nparagraph two\n",
            "ünïcødé\u{00a0}spaces\u{2003}too",
        ];
        for input in inputs {
            let tokens = tokenize(input);
            assert_eq!(join(&tokens), input);
            assert!(tokens.iter().all(|t| !t.text.is_empty()), "{input:?}");
        }
    }

    #[test]
    fn test_empty_input_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_alternating_kinds() {
        let tokens = tokenize(" a b\n\nc ");
        assert_eq!(texts(&tokens), vec![" ", "a", " ", "b", "\n\n", "c", " "]);
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Whitespace,
                TokenKind::Word,
                TokenKind::Whitespace,
                TokenKind::Word,
                TokenKind::Whitespace,
                TokenKind::Word,
                TokenKind::Whitespace,
            ]
        );
    }

    #[test]
    fn test_indices_and_offsets() {
        let text = "hello  world";
        let tokens = tokenize(text);
        for (i, token) in tokens.iter().enumerate() {
            assert_eq!(token.index, i);
            assert_eq!(&text[token.offset..token.offset + token.text.len()], token.text);
        }
    }

    #[test]
    fn test_range_normalizes_and_slices() {
        let tokens = tokenize("one two three");
        let range = TokenRange::new(4, 2);
        assert_eq!(range, TokenRange { start: 2, end: 4 });
        assert_eq!(range.slice(&tokens).as_deref(), Some("two three"));
        assert_eq!(TokenRange::new(3, 9).slice(&tokens), None);
    }
}
