//! Full-screen stream view where words are click targets.
//!
//! A click copies from the word to the end of its paragraph; a second click
//! copies the range between both words. Changes written to the store by
//! other processes reload the view.

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use streampad_core::render::{EMPTY_PLACEHOLDER, Node, render_token};
use streampad_core::{
    ClickOutcome, Clipboard, EntryStore, PageName, Selection, StoreError, StoreWatcher,
    StreamDocument,
};

use crate::layout::StreamLayout;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickExit {
    Quit,
    /// Leave the view so the page can be opened in an editor.
    Edit,
}

pub struct PickState<'s> {
    store: &'s dyn EntryStore,
    doc: StreamDocument,
    selection: Selection,
    clipboard: Box<dyn Clipboard>,
    /// Screen area the stream was last drawn into
    area: Rect,
    scroll: usize,
    status: String,
}

impl<'s> PickState<'s> {
    pub fn new(
        store: &'s dyn EntryStore,
        page: &PageName,
        clipboard: Box<dyn Clipboard>,
    ) -> Result<Self, StoreError> {
        Ok(PickState {
            store,
            doc: StreamDocument::load(store, page)?,
            selection: Selection::new(),
            clipboard,
            area: Rect::default(),
            scroll: 0,
            status: String::new(),
        })
    }

    pub fn page(&self) -> &PageName {
        &self.doc.page
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }

    /// Throw away the current document and selection and read the page again.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.doc = StreamDocument::load(self.store, &self.doc.page)?;
        self.selection.reset();
        self.status = "Reloaded".to_string();
        Ok(())
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        self.selection.tick(now)
    }

    pub fn scroll_by(&mut self, delta: isize) {
        self.scroll = self.scroll.saturating_add_signed(delta);
    }


    /// Handle a click on a terminal cell.
    pub fn click_cell(&mut self, column: u16, row: u16, now: Instant) -> ClickOutcome {
        let area = self.area;
        if column < area.x
            || row < area.y
            || column >= area.x + area.width
            || row >= area.y + area.height
        {
            return ClickOutcome::Ignored;
        }

        let tokens = self.doc.tokens();
        let layout = StreamLayout::new(&tokens, area.width);
        let Some(index) = layout.hit_test((row - area.y) as usize + self.scroll, (column - area.x) as usize)
        else {
            return ClickOutcome::Ignored;
        };

        let outcome = self
            .selection
            .click(&tokens, index, now, self.clipboard.as_mut());
        match &outcome {
            ClickOutcome::Ignored => {}
            ClickOutcome::Preview { text, .. } => {
                self.status = format!(
                    "Copied {} characters to end of paragraph, click another word for a range",
                    text.chars().count()
                );
            }
            ClickOutcome::Commit { text, .. } => {
                self.status = format!("Copied {} characters", text.chars().count());
            }
        }
        outcome
    }
}

fn clamp_scroll(scroll: usize, rows: usize, height: u16) -> usize {
    scroll.min(rows.saturating_sub(height as usize))
}

fn draw(frame: &mut Frame, state: &mut PickState<'_>) {
    let chunks = Layout::default()
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let block = Block::default().borders(Borders::ALL).title(format!(
        " {} - click words to copy, e to edit, q to quit ",
        state.page()
    ));
    let inner = block.inner(chunks[0]);
    state.set_area(inner);

    let tokens = state.doc.tokens();
    let lines: Vec<Line> = if tokens.is_empty() {
        vec![Line::from(Span::styled(
            EMPTY_PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let layout = StreamLayout::new(&tokens, inner.width);
        state.scroll = clamp_scroll(state.scroll, layout.rows(), inner.height);
        let highlight = state.selection.highlight();
        (state.scroll..layout.rows())
            .take(inner.height as usize)
            .map(|row| {
                let spans: Vec<Span> = layout
                    .row(row)
                    .map(|segment| {
                        let rendered = render_token(&tokens[segment.index], highlight);
                        let mut style = match rendered.node {
                            Node::Link { .. } => Style::default()
                                .fg(Color::Blue)
                                .add_modifier(Modifier::UNDERLINED),
                            Node::Word | Node::Inert => Style::default(),
                        };
                        if rendered.highlighted {
                            style = style.add_modifier(Modifier::REVERSED);
                        }
                        Span::styled(segment.text.clone(), style)
                    })
                    .collect();
                Line::from(spans)
            })
            .collect()
    };

    frame.render_widget(Paragraph::new(lines).block(block), chunks[0]);

    let status = Paragraph::new(format!(" {}", state.status()))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status, chunks[1]);
}

/// Returns `Some` when the view should close.
fn handle_key(key: KeyEvent, state: &mut PickState<'_>) -> Option<PickExit> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let page_rows = state.area.height.max(1) as isize;
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Some(PickExit::Quit),
        KeyCode::Char('e') => return Some(PickExit::Edit),
        KeyCode::Down | KeyCode::Char('j') => state.scroll_by(1),
        KeyCode::Up | KeyCode::Char('k') => state.scroll_by(-1),
        KeyCode::PageDown | KeyCode::Char(' ') => state.scroll_by(page_rows),
        KeyCode::PageUp => state.scroll_by(-page_rows),
        _ => {}
    }
    None
}

fn handle_mouse(mouse: MouseEvent, state: &mut PickState<'_>) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            state.click_cell(mouse.column, mouse.row, Instant::now());
        }
        MouseEventKind::ScrollDown => state.scroll_by(1),
        MouseEventKind::ScrollUp => state.scroll_by(-1),
        _ => {}
    }
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut PickState<'_>,
    watcher: Option<&StoreWatcher>,
) -> Result<PickExit, String> {
    loop {
        terminal
            .draw(|frame| draw(frame, state))
            .map_err(|e| format!("Failed to draw: {}", e))?;

        if event::poll(POLL_INTERVAL).map_err(|e| e.to_string())? {
            match event::read().map_err(|e| e.to_string())? {
                Event::Key(key) => {
                    if let Some(exit) = handle_key(key, state) {
                        return Ok(exit);
                    }
                }
                Event::Mouse(mouse) => handle_mouse(mouse, state),
                _ => {}
            }
        }

        state.tick(Instant::now());

        if let Some(watcher) = watcher
            && watcher.drain().contains(state.page())
        {
            // A failed read keeps the current text; the next change retries.
            if let Err(err) = state.reload() {
                tracing::warn!(%err, page = %state.page(), "failed to reload page");
            }
        }
    }
}

/// Run the interactive view until the user quits or asks to edit.
pub fn run(
    store: &dyn EntryStore,
    page: &PageName,
    clipboard: Box<dyn Clipboard>,
    watch_dir: Option<&Path>,
) -> Result<PickExit, String> {
    let mut state = PickState::new(store, page, clipboard).map_err(|e| e.to_string())?;
    let watcher = watch_dir.and_then(|dir| match StoreWatcher::new(dir) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            tracing::warn!(%err, "not watching for page changes");
            None
        }
    });

    enable_raw_mode().map_err(|e| e.to_string())?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture).map_err(|e| e.to_string())?;
    let mut terminal =
        Terminal::new(CrosstermBackend::new(stdout)).map_err(|e| e.to_string())?;

    let result = event_loop(&mut terminal, &mut state, watcher.as_ref());

    disable_raw_mode().map_err(|e| e.to_string())?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )
    .map_err(|e| e.to_string())?;
    terminal.show_cursor().map_err(|e| e.to_string())?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use streampad_core::{MemoryClipboard, MemoryStore, TokenRange};

    fn state_with(store: &MemoryStore, text: &str) -> PickState<'_> {
        let page = PageName::home();
        store.post(&page, text.to_string()).unwrap();
        let mut state = PickState::new(store, &page, Box::new(MemoryClipboard::new())).unwrap();
        state.set_area(Rect::new(1, 1, 20, 5));
        state
    }

    #[test]
    fn test_click_outside_stream_is_ignored() {
        let store = MemoryStore::new();
        let mut state = state_with(&store, "alpha beta");
        assert_eq!(state.click_cell(0, 0, Instant::now()), ClickOutcome::Ignored);
        assert_eq!(state.click_cell(1, 3, Instant::now()), ClickOutcome::Ignored);
    }

    #[test]
    fn test_two_clicks_copy_a_range() {
        let store = MemoryStore::new();
        let mut state = state_with(&store, "alpha beta\n\ngamma delta");
        let now = Instant::now();

        let first = state.click_cell(2, 1, now);
        assert_eq!(first.text(), Some("alpha beta"));
        assert!(state.status().starts_with("Copied 10 characters"));

        // "delta" sits on the third stream row, six cells in.
        let second = state.click_cell(8, 3, now);
        assert_eq!(second.range(), Some(TokenRange::new(0, 6)));
        assert_eq!(second.text(), Some("alpha beta\n\ngamma delta"));
    }

    #[test]
    fn test_click_on_whitespace_is_ignored() {
        let store = MemoryStore::new();
        let mut state = state_with(&store, "alpha beta");
        assert_eq!(state.click_cell(6, 1, Instant::now()), ClickOutcome::Ignored);
    }

    #[test]
    fn test_reload_resets_selection() {
        let store = MemoryStore::new();
        let mut state = state_with(&store, "alpha beta");
        state.click_cell(1, 1, Instant::now());
        assert!(state.selection().anchor().is_some());

        store.post(&PageName::home(), "newer".to_string()).unwrap();
        state.reload().unwrap();

        assert_eq!(state.selection().anchor(), None);
        assert_eq!(state.doc.text(), "newer\n\nalpha beta");
    }

    #[test]
    fn test_scroll_is_clamped() {
        let store = MemoryStore::new();
        let mut state = state_with(&store, "a\nb\nc\nd\ne\nf\ng");
        state.scroll_by(100);
        assert_eq!(clamp_scroll(state.scroll, 7, state.area.height), 2);
        state.scroll_by(-100);
        assert_eq!(state.scroll, 0);
    }
}
