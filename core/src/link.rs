//! URL sniffing for words in a stream.
//!
//! Two independent predicates decide whether a word looks like a URL: a
//! strict pattern and a loose heuristic. A word is linked when either one
//! accepts it. The loose heuristic is permissive on purpose and will happily
//! accept things like `e.g.test`.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

fn strict_url_regex() -> &'static Regex {
    static STRICT: OnceLock<Regex> = OnceLock::new();
    STRICT.get_or_init(|| {
        // scheme, domain labels, top level label, path and query, trailing slash
        Regex::new(r"(?i)^(?:https?://)?[\da-z.-]+\.[a-z.]{2,6}[/\w.?=&%#~+:-]*/?$")
            .expect("valid strict url regex")
    })
}

fn inline_url_regex() -> &'static Regex {
    static INLINE: OnceLock<Regex> = OnceLock::new();
    INLINE.get_or_init(|| {
        Regex::new(r"(?:https?://)?(?:www\.)?(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}(?:/[^\s]*)?")
            .expect("valid inline url regex")
    })
}

fn standalone_url_regex() -> &'static Regex {
    static STANDALONE: OnceLock<Regex> = OnceLock::new();
    STANDALONE.get_or_init(|| {
        Regex::new(r"^(?:https?://)?(?:www\.)?(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}(?:/[^\s]*)?$")
            .expect("valid standalone url regex")
    })
}

/// Scheme, dotted domain, 2-6 letter top level label, optional path.
pub fn is_strict_url(word: &str) -> bool {
    strict_url_regex().is_match(word)
}

/// Contains a dot, is longer than four characters and neither starts nor
/// ends with a dot.
pub fn is_loose_url(word: &str) -> bool {
    word.contains('.')
        && word.chars().count() > 4
        && !word.starts_with('.')
        && !word.ends_with('.')
}

pub fn looks_like_url(word: &str) -> bool {
    is_strict_url(word) || is_loose_url(word)
}

fn has_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Navigable form of a URL-ish word.
pub fn href_for(word: &str) -> String {
    if has_scheme(word) {
        word.to_string()
    } else {
        format!("https://{word}")
    }
}

/// Display form: no scheme, no leading `www.`, no trailing slash.
pub fn clean_url(url: &str) -> &str {
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let url = url.strip_prefix("www.").unwrap_or(url);
    url.strip_suffix('/').unwrap_or(url)
}

/// True when the whole line is a single URL.
pub fn is_standalone_url(line: &str) -> bool {
    standalone_url_regex().is_match(line)
}

/// A URL found inside free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    /// Byte range of the match in the searched text
    pub range: Range<usize>,
    pub href: String,
    pub display: String,
}

/// Find URL-looking runs in free text, used for the single entry view.
pub fn find_links(text: &str) -> Vec<LinkMatch> {
    inline_url_regex()
        .find_iter(text)
        .map(|m| LinkMatch {
            range: m.range(),
            href: href_for(m.as_str()),
            display: clean_url(m.as_str()).to_string(),
        })
        .collect()
}
