//! Two-click range selection over a token stream.
//!
//! The first click on a word copies the rest of its paragraph and leaves an
//! anchor behind. The second click copies everything between the anchor and
//! the clicked word, keeps the highlight visible for a short moment and then
//! returns to idle.

use std::time::{Duration, Instant};

use crate::clipboard::{Clipboard, copy_opportunistic};
use crate::paragraph::paragraph_end;
use crate::tokenizer::{Token, TokenRange};

/// How long a completed selection stays highlighted.
pub const HIGHLIGHT_CLEAR_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    AnchorSet {
        anchor: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click did not address a token.
    Ignored,
    /// First click: the paragraph tail starting at the anchor was copied.
    Preview { range: TokenRange, text: String },
    /// Second click: the range between anchor and click was copied.
    Commit { range: TokenRange, text: String },
}

impl ClickOutcome {
    pub fn range(&self) -> Option<TokenRange> {
        match self {
            ClickOutcome::Ignored => None,
            ClickOutcome::Preview { range, .. } | ClickOutcome::Commit { range, .. } => {
                Some(*range)
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ClickOutcome::Ignored => None,
            ClickOutcome::Preview { text, .. } | ClickOutcome::Commit { text, .. } => {
                Some(text.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    state: SelectionState,
    highlight: Option<TokenRange>,
    clear_at: Option<Instant>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn anchor(&self) -> Option<usize> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::AnchorSet { anchor } => Some(anchor),
        }
    }

    pub fn highlight(&self) -> Option<TokenRange> {
        self.highlight
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        self.highlight.is_some_and(|range| range.contains(index))
    }

    /// Deadline of the pending highlight clear, if a selection was completed.
    pub fn clear_deadline(&self) -> Option<Instant> {
        self.clear_at
    }

    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
        self.highlight = None;
        self.clear_at = None;
    }

    /// Finish a completed selection once its highlight delay has passed.
    ///
    /// Returns true when the highlight was cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.clear_at {
            Some(deadline) if now >= deadline => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Handle a click on the token at `index` and copy the selected text.
    ///
    /// Clipboard failures are ignored; the selection still advances.
    pub fn click<C: Clipboard + ?Sized>(
        &mut self,
        tokens: &[Token<'_>],
        index: usize,
        now: Instant,
        clipboard: &mut C,
    ) -> ClickOutcome {
        self.tick(now);

        // Whitespace is never a click target.
        if tokens.get(index).is_none_or(Token::is_whitespace) {
            return ClickOutcome::Ignored;
        }

        // The document may have been reloaded since the anchor was placed.
        let anchor = self.anchor().filter(|&anchor| anchor < tokens.len());

        let outcome = match anchor {
            None => {
                let range = TokenRange::new(index, paragraph_end(tokens, index));
                self.state = SelectionState::AnchorSet { anchor: index };
                self.clear_at = None;
                ClickOutcome::Preview {
                    range,
                    text: range.slice(tokens).unwrap_or_default(),
                }
            }
            Some(anchor) => {
                let range = TokenRange::new(anchor, index);
                self.clear_at = Some(now + HIGHLIGHT_CLEAR_DELAY);
                ClickOutcome::Commit {
                    range,
                    text: range.slice(tokens).unwrap_or_default(),
                }
            }
        };

        self.highlight = outcome.range();
        if let Some(text) = outcome.text() {
            copy_opportunistic(clipboard, text);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    const TEXT: &str = "alpha beta gamma\n\ndelta epsilon";

    #[test]
    fn test_first_click_previews_paragraph() {
        let tokens = tokenize(TEXT);
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();

        let outcome = selection.click(&tokens, 2, Instant::now(), &mut clipboard);

        assert_eq!(
            outcome,
            ClickOutcome::Preview {
                range: TokenRange::new(2, 4),
                text: "beta gamma".to_string(),
            }
        );
        assert_eq!(selection.state(), SelectionState::AnchorSet { anchor: 2 });
        assert_eq!(clipboard.contents(), Some("beta gamma"));
        assert!(selection.is_highlighted(3));
        assert!(!selection.is_highlighted(5));
        assert_eq!(selection.clear_deadline(), None);
    }

    #[test]
    fn test_second_click_normalizes_order() {
        let tokens = tokenize("zero one two three four five six");
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();
        let now = Instant::now();

        selection.click(&tokens, 10, now, &mut clipboard);
        let outcome = selection.click(&tokens, 4, now, &mut clipboard);

        assert_eq!(outcome.range(), Some(TokenRange { start: 4, end: 10 }));
        assert_eq!(clipboard.contents(), Some("two three four five"));
    }

    #[test]
    fn test_same_token_twice_selects_single_token_and_resets() {
        let tokens = tokenize(TEXT);
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();
        let now = Instant::now();

        selection.click(&tokens, 0, now, &mut clipboard);
        let outcome = selection.click(&tokens, 0, now, &mut clipboard);
        assert_eq!(outcome.range(), Some(TokenRange::single(0)));
        assert_eq!(clipboard.contents(), Some("alpha"));

        assert!(!selection.tick(now + Duration::from_millis(100)));
        assert_eq!(selection.highlight(), Some(TokenRange::single(0)));

        assert!(selection.tick(now + HIGHLIGHT_CLEAR_DELAY));
        assert_eq!(selection.state(), SelectionState::Idle);
        assert_eq!(selection.highlight(), None);
    }

    #[test]
    fn test_click_after_delay_starts_over() {
        let tokens = tokenize(TEXT);
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();
        let now = Instant::now();

        selection.click(&tokens, 0, now, &mut clipboard);
        selection.click(&tokens, 2, now, &mut clipboard);
        let later = now + HIGHLIGHT_CLEAR_DELAY + Duration::from_millis(1);
        let outcome = selection.click(&tokens, 6, later, &mut clipboard);

        assert!(matches!(outcome, ClickOutcome::Preview { .. }));
        assert_eq!(outcome.text(), Some("delta epsilon"));
    }

    #[test]
    fn test_click_during_delay_reuses_anchor() {
        let tokens = tokenize(TEXT);
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();
        let now = Instant::now();

        selection.click(&tokens, 0, now, &mut clipboard);
        selection.click(&tokens, 2, now, &mut clipboard);
        let outcome = selection.click(&tokens, 4, now + Duration::from_millis(50), &mut clipboard);

        assert_eq!(outcome.range(), Some(TokenRange::new(0, 4)));
    }

    #[test]
    fn test_out_of_range_click_is_ignored() {
        let tokens = tokenize("a b");
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();

        let outcome = selection.click(&tokens, 3, Instant::now(), &mut clipboard);

        assert_eq!(outcome, ClickOutcome::Ignored);
        assert_eq!(selection.state(), SelectionState::Idle);
        assert_eq!(clipboard.writes(), 0);
    }

    #[test]
    fn test_whitespace_click_is_ignored() {
        let tokens = tokenize(TEXT);
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();
        let now = Instant::now();

        assert_eq!(selection.click(&tokens, 1, now, &mut clipboard), ClickOutcome::Ignored);
        assert_eq!(selection.state(), SelectionState::Idle);

        selection.click(&tokens, 0, now, &mut clipboard);
        assert_eq!(selection.click(&tokens, 5, now, &mut clipboard), ClickOutcome::Ignored);
        assert_eq!(selection.anchor(), Some(0));
        assert_eq!(clipboard.writes(), 1);
    }

    #[test]
    fn test_stale_anchor_is_dropped_after_reload() {
        let long = tokenize("one two three four five");
        let short = tokenize("six seven");
        let mut clipboard = MemoryClipboard::new();
        let mut selection = Selection::new();
        let now = Instant::now();

        selection.click(&long, 8, now, &mut clipboard);
        let outcome = selection.click(&short, 2, now, &mut clipboard);

        assert!(matches!(outcome, ClickOutcome::Preview { .. }));
        assert_eq!(selection.anchor(), Some(2));
        assert_eq!(clipboard.contents(), Some("seven"));
    }

    #[test]
    fn test_denied_clipboard_still_advances() {
        let tokens = tokenize(TEXT);
        let mut clipboard = MemoryClipboard::denying();
        let mut selection = Selection::new();
        let now = Instant::now();

        selection.click(&tokens, 0, now, &mut clipboard);
        let outcome = selection.click(&tokens, 2, now, &mut clipboard);

        assert_eq!(outcome.text(), Some("alpha beta"));
        assert!(selection.clear_deadline().is_some());
    }
}
