//! Core of streampad: stream text handling and entry storage.

pub mod clipboard;
pub mod document;
pub mod entry;
pub mod link;
pub mod paragraph;
pub mod render;
pub mod selection;
pub mod store;
pub mod tokenizer;
pub mod watch;

pub use clipboard::{Clipboard, ClipboardError, CopyStatus, MemoryClipboard};
pub use document::StreamDocument;
pub use entry::{Entry, PageName};
pub use selection::{ClickOutcome, Selection, SelectionState};
pub use store::{EntryStore, FileStore, MemoryStore, StoreError};
pub use tokenizer::{Token, TokenKind, TokenRange, tokenize};
pub use watch::StoreWatcher;
