use std::io::{self, IsTerminal};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};
use ratatui::{Frame, Terminal};

/// Rows taken by the border and the status bar
const CHROME_ROWS: u16 = 3;

#[derive(Debug)]
struct PagerState {
    offset: usize,
    total_lines: usize,
    viewport_height: usize,
}

impl PagerState {
    fn new(total_lines: usize, viewport_height: usize) -> Self {
        Self {
            offset: 0,
            total_lines,
            viewport_height,
        }
    }

    fn max_offset(&self) -> usize {
        self.total_lines.saturating_sub(self.viewport_height)
    }

    fn scroll_by(&mut self, delta: isize) {
        self.offset = self.offset.saturating_add_signed(delta).min(self.max_offset());
    }

    fn jump_to_start(&mut self) {
        self.offset = 0;
    }

    fn jump_to_end(&mut self) {
        self.offset = self.max_offset();
    }

    fn position(&self) -> String {
        if self.total_lines == 0 {
            return " (empty)".to_string();
        }
        let percentage = if self.max_offset() == 0 {
            100
        } else {
            (self.offset * 100) / self.max_offset()
        };
        format!(
            " Line {}/{} ({}%)",
            self.offset + 1,
            self.total_lines,
            percentage
        )
    }
}

fn render_pager(frame: &mut Frame, title: &str, content: &[String], state: &mut PagerState) {
    let area = frame.area();
    state.viewport_height = area.height.saturating_sub(CHROME_ROWS) as usize;

    let chunks = Layout::default()
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let visible: Vec<Line> = content
        .iter()
        .skip(state.offset)
        .take(state.viewport_height)
        .map(|line| Line::from(line.as_str()))
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {title} - q to quit, j/k, PgUp/PgDn, g/G "));
    frame.render_widget(Paragraph::new(visible).block(block), chunks[0]);

    if state.total_lines > state.viewport_height {
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));
        let mut scrollbar_state = ScrollbarState::default()
            .content_length(state.total_lines)
            .viewport_content_length(state.viewport_height)
            .position(state.offset);
        let track = Rect {
            x: chunks[0].x + chunks[0].width.saturating_sub(1),
            y: chunks[0].y + 1,
            width: 1,
            height: chunks[0].height.saturating_sub(2),
        };
        frame.render_stateful_widget(scrollbar, track, &mut scrollbar_state);
    }

    let status = Paragraph::new(state.position())
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status, chunks[1]);
}

/// Returns false when the pager should close.
fn handle_key_event(key: KeyEvent, state: &mut PagerState) -> bool {
    if key.kind != KeyEventKind::Press {
        return true;
    }
    let page = state.viewport_height.max(1) as isize;
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Down | KeyCode::Char('j') => state.scroll_by(1),
        KeyCode::Up | KeyCode::Char('k') => state.scroll_by(-1),
        KeyCode::PageDown | KeyCode::Char(' ') => state.scroll_by(page),
        KeyCode::PageUp => state.scroll_by(-page),
        KeyCode::Home | KeyCode::Char('g') => state.jump_to_start(),
        KeyCode::End | KeyCode::Char('G') => state.jump_to_end(),
        _ => {}
    }
    true
}

fn run_interactive_pager(title: &str, content: &[String]) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let viewport_height = terminal.size()?.height.saturating_sub(CHROME_ROWS) as usize;
    let mut state = PagerState::new(content.len(), viewport_height);

    let result = loop {
        if let Err(e) = terminal.draw(|frame| render_pager(frame, title, content, &mut state)) {
            break Err(e);
        }
        match event::poll(Duration::from_millis(100)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if !handle_key_event(key, &mut state) {
                        break Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e),
            },
            Ok(false) => {}
            Err(e) => break Err(e),
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn needs_pager(line_count: usize, terminal_height: u16) -> bool {
    line_count > terminal_height.saturating_sub(CHROME_ROWS) as usize
}

/// Print `content`, through the interactive pager when stdout is a terminal
/// too short to show it at once.
pub fn page_output(title: &str, content: &str) -> Result<(), String> {
    let lines: Vec<String> = content.lines().map(str::to_string).collect();

    let should_page = io::stdout().is_terminal()
        && crossterm::terminal::size()
            .map(|(_, height)| needs_pager(lines.len(), height))
            .unwrap_or(false);

    if should_page {
        run_interactive_pager(title, &lines).map_err(|e| format!("Pager error: {}", e))
    } else {
        print!("{}", content);
        Ok(())
    }
}
