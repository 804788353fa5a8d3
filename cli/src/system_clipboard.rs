use streampad_core::{Clipboard, ClipboardError};

/// The desktop clipboard, through arboard.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        arboard::Clipboard::new()
            .map(|inner| SystemClipboard { inner })
            .map_err(|err| ClipboardError::Unavailable(err.to_string()))
    }
}

fn map_error(err: arboard::Error) -> ClipboardError {
    match err {
        arboard::Error::ContentNotAvailable => ClipboardError::Empty,
        arboard::Error::ClipboardOccupied => ClipboardError::Denied(err.to_string()),
        other => ClipboardError::Unavailable(other.to_string()),
    }
}

impl Clipboard for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.inner.set_text(text).map_err(map_error)
    }

    fn read_text(&mut self) -> Result<String, ClipboardError> {
        self.inner.get_text().map_err(map_error)
    }
}

/// The system clipboard, or an in-process one when there is none (e.g. over ssh).
pub fn open_or_fallback() -> Box<dyn Clipboard> {
    match SystemClipboard::new() {
        Ok(clipboard) => Box::new(clipboard),
        Err(err) => {
            tracing::warn!(%err, "system clipboard unavailable, copies stay in process");
            Box::new(streampad_core::MemoryClipboard::new())
        }
    }
}
