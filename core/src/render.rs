//! Projection of a token stream into click targets and markup.
//!
//! Rendering is split in two steps: [`render_stream`] decides what each token
//! becomes (inert whitespace, clickable word, clickable link) and which ones
//! are highlighted; [`to_html`] turns that into escaped markup. Front-ends
//! that do not speak HTML use the first step only.

use crate::link::{find_links, href_for, looks_like_url};
use crate::tokenizer::{Token, TokenRange, tokenize};

pub const EMPTY_PLACEHOLDER: &str = "tap to write";
pub const HIGHLIGHT_CLASS: &str = "selection-highlight";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Whitespace: selectable text but never a click target
    Inert,
    Word,
    Link { href: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedToken<'a> {
    pub index: usize,
    pub text: &'a str,
    pub node: Node,
    pub highlighted: bool,
}

impl RenderedToken<'_> {
    pub fn is_click_target(&self) -> bool {
        !matches!(self.node, Node::Inert)
    }
}

pub fn render_token<'a>(token: &Token<'a>, highlight: Option<TokenRange>) -> RenderedToken<'a> {
    let node = if token.is_whitespace() {
        Node::Inert
    } else if looks_like_url(token.text) {
        Node::Link {
            href: href_for(token.text),
        }
    } else {
        Node::Word
    };
    RenderedToken {
        index: token.index,
        text: token.text,
        node,
        highlighted: highlight.is_some_and(|range| range.contains(token.index)),
    }
}

pub fn render_stream<'a>(
    tokens: &[Token<'a>],
    highlight: Option<TokenRange>,
) -> Vec<RenderedToken<'a>> {
    tokens.iter().map(|t| render_token(t, highlight)).collect()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn span_class(base: &str, highlighted: bool) -> String {
    if highlighted {
        format!("{base} {HIGHLIGHT_CLASS}")
    } else {
        base.to_string()
    }
}

pub fn to_html(rendered: &[RenderedToken<'_>]) -> String {
    let mut html = String::new();
    for token in rendered {
        let text = escape_html(token.text);
        match &token.node {
            Node::Inert => {
                let class = span_class("whitespace-span", token.highlighted);
                html.push_str(&format!(
                    r#"<span class="{class}" data-idx="{}">{text}</span>"#,
                    token.index
                ));
            }
            Node::Word => {
                let class = span_class("word-span", token.highlighted);
                html.push_str(&format!(
                    r#"<span class="{class}" data-idx="{}">{text}</span>"#,
                    token.index
                ));
            }
            Node::Link { href } => {
                let class = span_class("word-span", token.highlighted);
                html.push_str(&format!(
                    r#"<span class="{class}" data-idx="{}"><a href="{}" target="_blank" rel="noopener noreferrer">{text}</a></span>"#,
                    token.index,
                    escape_html(href)
                ));
            }
        }
    }
    html
}

/// Markup for a whole stream document, with an optional highlighted range.
pub fn render_stream_html(text: &str, highlight: Option<TokenRange>) -> String {
    if text.is_empty() {
        return format!(r#"<div class="placeholder">{EMPTY_PLACEHOLDER}</div>"#);
    }
    let tokens = tokenize(text);
    to_html(&render_stream(&tokens, highlight))
}

/// A piece of a single entry's text in the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailSegment<'a> {
    Text(&'a str),
    Link { href: String, display: String },
}

/// Split free text into plain runs and links with their display form.
pub fn detail_segments(text: &str) -> Vec<DetailSegment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for found in find_links(text) {
        if found.range.start > cursor {
            segments.push(DetailSegment::Text(&text[cursor..found.range.start]));
        }
        segments.push(DetailSegment::Link {
            href: found.href,
            display: found.display,
        });
        cursor = found.range.end;
    }
    if cursor < text.len() {
        segments.push(DetailSegment::Text(&text[cursor..]));
    }
    segments
}

/// Markup for a single entry, links shown in their cleaned form.
pub fn render_detail_html(text: &str) -> String {
    let mut html = String::new();
    for segment in detail_segments(text) {
        match segment {
            DetailSegment::Text(text) => {
                html.push_str(&format!("<span>{}</span>", escape_html(text)));
            }
            DetailSegment::Link { href, display } => {
                html.push_str(&format!(
                    r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                    escape_html(&href),
                    escape_html(&display)
                ));
            }
        }
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nodes_per_token() {
        let tokens = tokenize("see example.com now");
        let rendered = render_stream(&tokens, None);
        assert_eq!(rendered[0].node, Node::Word);
        assert_eq!(rendered[1].node, Node::Inert);
        assert_eq!(
            rendered[2].node,
            Node::Link {
                href: "https://example.com".to_string()
            }
        );
        assert!(!rendered[1].is_click_target());
        assert!(rendered[2].is_click_target());
    }

    #[test]
    fn test_stream_html() {
        let html = render_stream_html("hi example.com", Some(TokenRange::new(0, 1)));
        insta::assert_snapshot!(html, @r#"<span class="word-span selection-highlight" data-idx="0">hi</span><span class="whitespace-span selection-highlight" data-idx="1"> </span><span class="word-span" data-idx="2"><a href="https://example.com" target="_blank" rel="noopener noreferrer">example.com</a></span>"#);
    }

    #[test]
    fn test_markup_is_escaped() {
        let html = render_stream_html("<script>alert('x')</script>", None);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;"));
    }

    #[test]
    fn test_link_href_is_escaped() {
        let html = render_stream_html("a.b\"onmouseover=x", None);
        assert!(html.contains(r#"href="https://a.b&quot;onmouseover=x""#));
    }

    #[test]
    fn test_empty_stream_placeholder() {
        assert_eq!(
            render_stream_html("", None),
            r#"<div class="placeholder">tap to write</div>"#
        );
    }

    #[test]
    fn test_detail_html_uses_clean_display() {
        let html = render_detail_html("read https://www.example.com/ <now>");
        insta::assert_snapshot!(html, @r#"<span>read </span><a href="https://www.example.com/" target="_blank" rel="noopener noreferrer">example.com</a><span> &lt;now&gt;</span>"#);
    }
}
