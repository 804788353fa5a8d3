use crate::entry::{PageName, join_stream};
use crate::store::{EntryStore, StoreError};
use crate::tokenizer::{Token, tokenize};

/// The editable text of one page, loaded from and saved to an entry store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDocument {
    pub page: PageName,
    text: String,
    /// Text as last loaded or saved
    saved: String,
}

impl StreamDocument {
    pub fn new(page: PageName, text: String) -> Self {
        StreamDocument {
            page,
            saved: text.clone(),
            text,
        }
    }

    /// Load a page as one stream, newest entry first.
    pub fn load(store: &dyn EntryStore, page: &PageName) -> Result<Self, StoreError> {
        let entries = store.list(page)?;
        Ok(StreamDocument::new(page.clone(), join_stream(&entries)))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> Vec<Token<'_>> {
        tokenize(&self.text)
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    pub fn is_dirty(&self) -> bool {
        self.text != self.saved
    }

    /// Overwrite the page with the current text as a single entry.
    ///
    /// Nothing is written when the text is unchanged, and empty text clears
    /// the page. There is no version check: whatever was stored in the
    /// meantime is replaced.
    pub fn save(&mut self, store: &dyn EntryStore) -> Result<bool, StoreError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let contents: &[String] = if self.text.is_empty() {
            &[]
        } else {
            std::slice::from_ref(&self.text)
        };
        store.replace_page(&self.page, contents)?;
        self.saved = self.text.clone();
        tracing::info!(page = %self.page, bytes = self.text.len(), "saved stream");
        Ok(true)
    }
}
