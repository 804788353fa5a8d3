use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::link::{clean_url, is_standalone_url};
use crate::store::StoreError;

pub const DEFAULT_PAGE: &str = "home";
pub const RESERVED_PAGE: &str = "api";

/// Separator between entries when a page is shown as one stream.
pub const STREAM_GAP: &str = "\n\n";

const PREVIEW_LIMIT: usize = 100;

/// Lowercase page identifier, validated so it can double as a file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageName(String);

impl PageName {
    /// Parse a page name as given in a query string or request body.
    ///
    /// A missing or blank name means the `home` page.
    pub fn parse(raw: Option<&str>) -> Result<Self, StoreError> {
        let name = raw
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PAGE)
            .to_lowercase();

        if name == RESERVED_PAGE {
            return Err(StoreError::ReservedPage(name));
        }
        if name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.chars().any(char::is_control)
        {
            return Err(StoreError::InvalidPageName(name));
        }
        Ok(PageName(name))
    }

    pub fn home() -> Self {
        PageName(DEFAULT_PAGE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PageName {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PageName::parse(Some(&value))
    }
}

impl From<PageName> for String {
    fn from(value: PageName) -> Self {
        value.0
    }
}

/// One stored text blob of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub page_name: PageName,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(page_name: PageName, content: String, created_at: DateTime<Utc>) -> Self {
        Entry {
            id: Uuid::new_v4(),
            page_name,
            content,
            created_at,
        }
    }

    pub fn preview(&self) -> String {
        preview_line(&self.content)
    }
}

/// One-line summary of an entry for list views.
///
/// Shows the first line; a line that is nothing but a URL is shown in its
/// cleaned form. Long lines are cut, and an ellipsis marks hidden text.
pub fn preview_line(content: &str) -> String {
    let mut lines = content.split('\n');
    let first = lines.next().unwrap_or_default();
    let more_lines = lines.next().is_some();

    let first = if is_standalone_url(first) {
        clean_url(first)
    } else {
        first
    };

    let graphemes: Vec<&str> = first.graphemes(true).collect();
    if graphemes.len() > PREVIEW_LIMIT {
        format!("{}...", graphemes[..PREVIEW_LIMIT].concat())
    } else if more_lines {
        format!("{first}...")
    } else {
        first.to_string()
    }
}

/// Join entries (newest first) into the stream text shown for a page.
pub fn join_stream(entries: &[Entry]) -> String {
    entries
        .iter()
        .map(|e| e.content.as_str())
        .collect::<Vec<_>>()
        .join(STREAM_GAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_name_defaults_and_lowercases() {
        assert_eq!(PageName::parse(None).unwrap().as_str(), "home");
        assert_eq!(PageName::parse(Some("  ")).unwrap().as_str(), "home");
        assert_eq!(PageName::parse(Some("Work")).unwrap().as_str(), "work");
    }

    #[test]
    fn test_reserved_page_is_rejected() {
        assert!(matches!(
            PageName::parse(Some("API")),
            Err(StoreError::ReservedPage(_))
        ));
    }

    #[test]
    fn test_unsafe_page_names_are_rejected() {
        for name in ["../etc", "a/b", ".hidden", "a\\b", "tab\tname"] {
            assert!(
                matches!(PageName::parse(Some(name)), Err(StoreError::InvalidPageName(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn test_page_name_serde_validates() {
        let ok: PageName = serde_json::from_str("\"Notes\"").unwrap();
        assert_eq!(ok.as_str(), "notes");
        assert!(serde_json::from_str::<PageName>("\"api\"").is_err());
    }

    #[test]
    fn test_preview_single_line() {
        assert_eq!(preview_line("just text"), "just text");
    }

    #[test]
    fn test_preview_marks_more_lines() {
        assert_eq!(preview_line("title\nbody"), "title...");
    }

    #[test]
    fn test_preview_cleans_url_line() {
        assert_eq!(preview_line("https://www.example.com/"), "example.com");
        assert_eq!(preview_line("example.com/a\nnotes"), "example.com/a...");
    }

    #[test]
    fn test_preview_truncates_long_line() {
        let long = "é".repeat(150);
        let preview = preview_line(&long);
        assert_eq!(preview, format!("{}...", "é".repeat(100)));
    }

    #[test]
    fn test_join_stream() {
        let page = PageName::home();
        let entries = vec![
            Entry::new(page.clone(), "newest".into(), Utc::now()),
            Entry::new(page, "older".into(), Utc::now()),
        ];
        assert_eq!(join_stream(&entries), "newest\n\nolder");
    }
}
