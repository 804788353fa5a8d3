//! Placement of stream tokens on terminal cells.
//!
//! Words wrap as a whole; whitespace is laid out character by character so
//! newlines start new rows and blank lines stay visible. The same layout is
//! used for drawing and for mapping mouse clicks back to token indices.

use streampad_core::Token;
use unicode_width::UnicodeWidthChar;

const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub text: String,
    /// Whether a click on this segment addresses its token
    pub clickable: bool,
}

impl Segment {
    pub fn width(&self) -> usize {
        display_width(&self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamLayout {
    segments: Vec<Segment>,
    rows: usize,
}

fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Longest prefix of `text` that fits into `max` cells.
fn clip(text: &str, max: usize) -> String {
    let mut used = 0;
    let mut clipped = String::new();
    for ch in text.chars() {
        let w = char_width(ch);
        if used + w > max {
            break;
        }
        used += w;
        clipped.push(ch);
    }
    clipped
}

struct Cursor {
    row: usize,
    col: usize,
}

impl Cursor {
    fn newline(&mut self) {
        self.row += 1;
        self.col = 0;
    }
}

impl StreamLayout {
    pub fn new(tokens: &[Token<'_>], width: u16) -> Self {
        let width = usize::from(width.max(1));
        let mut segments = Vec::new();
        let mut at = Cursor { row: 0, col: 0 };

        for token in tokens {
            if token.is_word() {
                let w = display_width(token.text);
                if at.col > 0 && at.col + w > width {
                    at.newline();
                }
                let text = if w > width {
                    clip(token.text, width)
                } else {
                    token.text.to_string()
                };
                let placed = Segment {
                    index: token.index,
                    row: at.row,
                    col: at.col,
                    text,
                    clickable: true,
                };
                at.col += placed.width();
                segments.push(placed);
                continue;
            }

            let mut run = Segment {
                index: token.index,
                row: at.row,
                col: at.col,
                text: String::new(),
                clickable: false,
            };
            for ch in token.text.chars() {
                let cells = match ch {
                    '\n' => {
                        if !run.text.is_empty() {
                            segments.push(run.clone());
                        }
                        at.newline();
                        run.row = at.row;
                        run.col = 0;
                        run.text.clear();
                        continue;
                    }
                    '\t' => TAB_WIDTH,
                    ch if ch.is_control() => 0,
                    _ => 1,
                };
                for _ in 0..cells {
                    if at.col >= width {
                        // Whitespace at a soft wrap is swallowed.
                        break;
                    }
                    run.text.push(' ');
                    at.col += 1;
                }
            }
            if !run.text.is_empty() {
                segments.push(run);
            }
        }

        let rows = if tokens.is_empty() { 0 } else { at.row + 1 };
        StreamLayout { segments, rows }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Segments of one row, left to right.
    pub fn row(&self, row: usize) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(move |s| s.row == row)
    }

    /// Token index of the word under a cell, if any.
    pub fn hit_test(&self, row: usize, col: usize) -> Option<usize> {
        self.row(row)
            .find(|s| s.clickable && col >= s.col && col < s.col + s.width())
            .map(|s| s.index)
    }
}
