use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard access denied: {0}")]
    Denied(String),
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard is empty")]
    Empty,
}

/// Platform clipboard access.
///
/// Writes may fail at any time depending on permission state. Callers on
/// opportunistic paths are free to ignore the result; explicit copy flows
/// should surface it.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
    fn read_text(&mut self) -> Result<String, ClipboardError>;
}

impl<C: Clipboard + ?Sized> Clipboard for Box<C> {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        (**self).write_text(text)
    }

    fn read_text(&mut self) -> Result<String, ClipboardError> {
        (**self).read_text()
    }
}

/// Copy without bothering the user when it does not work.
pub fn copy_opportunistic<C: Clipboard + ?Sized>(clipboard: &mut C, text: &str) -> bool {
    match clipboard.write_text(text) {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(%err, "ignoring clipboard write failure");
            false
        }
    }
}

/// Result of a copy the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    Copied,
    /// The copy did not happen; offer the user a way to try again.
    Failed { error: ClipboardError },
}

impl CopyStatus {
    pub fn is_copied(&self) -> bool {
        matches!(self, CopyStatus::Copied)
    }

    /// Short status line as shown next to a copy affordance.
    pub fn label(&self) -> &'static str {
        match self {
            CopyStatus::Copied => "Copied to clipboard",
            CopyStatus::Failed { .. } => "Click to copy",
        }
    }
}

pub fn copy_explicit<C: Clipboard + ?Sized>(clipboard: &mut C, text: &str) -> CopyStatus {
    match clipboard.write_text(text) {
        Ok(()) => CopyStatus::Copied,
        Err(error) => {
            tracing::warn!(%error, "clipboard write failed");
            CopyStatus::Failed { error }
        }
    }
}

/// In-process clipboard, handy for headless use and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Option<String>,
    deny_writes: bool,
    writes: usize,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard that refuses every write, like a browser without focus.
    pub fn denying() -> Self {
        MemoryClipboard {
            deny_writes: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.deny_writes {
            return Err(ClipboardError::Denied("document is not focused".to_string()));
        }
        self.contents = Some(text.to_string());
        self.writes += 1;
        Ok(())
    }

    fn read_text(&mut self) -> Result<String, ClipboardError> {
        self.contents.clone().ok_or(ClipboardError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opportunistic_copy_swallows_errors() {
        let mut clipboard = MemoryClipboard::denying();
        assert!(!copy_opportunistic(&mut clipboard, "text"));
        assert_eq!(clipboard.contents(), None);
    }

    #[test]
    fn test_explicit_copy_reports_failure() {
        let mut clipboard = MemoryClipboard::denying();
        let status = copy_explicit(&mut clipboard, "text");
        assert!(!status.is_copied());
        assert_eq!(status.label(), "Click to copy");
    }

    #[test]
    fn test_memory_clipboard_round_trip() {
        let mut clipboard = MemoryClipboard::new();
        assert_eq!(clipboard.read_text(), Err(ClipboardError::Empty));
        assert_eq!(copy_explicit(&mut clipboard, "hello"), CopyStatus::Copied);
        assert_eq!(clipboard.read_text().as_deref(), Ok("hello"));
        assert_eq!(clipboard.writes(), 1);
    }
}
