//! Client side of the clipboard relay.
//!
//! A desktop opens a session, shows its link and copies every text that
//! arrives. A phone (or another terminal) sends its clipboard to that link.

use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use streampad_core::clipboard::copy_explicit;
use streampad_core::entry::preview_line;
use streampad_core::{Clipboard, ClipboardError, CopyStatus};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8787/";
const SYNC_EVENT: &str = "clipboard-sync";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("'{0}' is neither a session id nor a session link")]
    Target(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("event stream failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("nothing to send")]
    Empty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenedSession {
    pub session: Uuid,
    #[serde(rename = "mobileUrl")]
    pub mobile_url: String,
}

#[derive(Deserialize)]
struct Delivered {
    delivered: usize,
}

#[derive(Deserialize)]
struct RelayText {
    text: String,
}

pub struct RelayClient {
    http: Client,
    base: Url,
}

fn check(response: Response) -> Result<Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(RelayError::Status {
        status: status.as_u16(),
        message: response.text().unwrap_or_default(),
    })
}

impl RelayClient {
    pub fn new(base: Url) -> Result<Self, RelayError> {
        // Event streams stay open for as long as the user listens.
        let http = Client::builder().timeout(None::<Duration>).build()?;
        Ok(RelayClient { http, base })
    }

    fn endpoint(&self, session: Option<Uuid>) -> Result<Url, RelayError> {
        let path = match session {
            Some(session) => format!("api/relay/{session}"),
            None => "api/relay".to_string(),
        };
        Ok(self.base.join(&path)?)
    }

    pub fn open_session(&self) -> Result<OpenedSession, RelayError> {
        let response = self.http.post(self.endpoint(None)?).send()?;
        Ok(check(response)?.json()?)
    }

    /// Send text to a session. Returns how many listeners got it.
    pub fn send(&self, session: Uuid, text: &str) -> Result<usize, RelayError> {
        if text.is_empty() {
            return Err(RelayError::Empty);
        }
        let response = self
            .http
            .post(self.endpoint(Some(session))?)
            .json(&json!({ "text": text }))
            .send()?;
        let delivered: Delivered = check(response)?.json()?;
        Ok(delivered.delivered)
    }

    pub fn listen(&self, session: Uuid) -> Result<SseEvents<BufReader<Response>>, RelayError> {
        let response = check(self.http.get(self.endpoint(Some(session))?).send()?)?;
        Ok(SseEvents::new(BufReader::new(response)))
    }
}

/// Server base and session from a bare session id or a session link.
pub fn resolve_target(target: &str, server: &Url) -> Result<(Url, Uuid), RelayError> {
    if let Ok(session) = Uuid::parse_str(target) {
        return Ok((server.clone(), session));
    }
    let link = Url::parse(target).map_err(|_| RelayError::Target(target.to_string()))?;
    let session = link
        .query_pairs()
        .find(|(key, _)| key == "s")
        .and_then(|(_, value)| Uuid::parse_str(&value).ok())
        .ok_or_else(|| RelayError::Target(target.to_string()))?;
    // Links point at `<base>magic/mobile`.
    Ok((link.join("../")?, session))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Server-sent events read line by line from a response body.
pub struct SseEvents<R> {
    reader: R,
}

impl<R: BufRead> SseEvents<R> {
    pub fn new(reader: R) -> Self {
        SseEvents { reader }
    }
}

impl<R: BufRead> Iterator for SseEvents<R> {
    type Item = io::Result<SseEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut current = SseEvent::default();
        let mut seen = false;
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return seen.then_some(Ok(current)),
                Ok(_) => {}
                Err(err) => return Some(Err(err)),
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if seen {
                    return Some(Ok(current));
                }
                continue;
            }
            // Comments carry keep-alives.
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => {
                    current.event = value.to_string();
                    seen = true;
                }
                "data" => {
                    if !current.data.is_empty() {
                        current.data.push('\n');
                    }
                    current.data.push_str(value);
                    seen = true;
                }
                _ => {}
            }
        }
    }
}

/// Copy every relayed text as it arrives, reporting each copy on `out`.
///
/// A failed copy prints the text so it can still be copied by hand. Stops
/// after `limit` messages when given. Returns the number of messages.
pub fn receive<R, C, W>(
    events: SseEvents<R>,
    clipboard: &mut C,
    out: &mut W,
    limit: Option<usize>,
) -> Result<usize, RelayError>
where
    R: BufRead,
    C: Clipboard + ?Sized,
    W: Write,
{
    let mut received = 0;
    for event in events {
        let event = event?;
        if event.event != SYNC_EVENT {
            continue;
        }
        let message: RelayText = match serde_json::from_str(&event.data) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%err, "ignoring malformed relay event");
                continue;
            }
        };

        let status = copy_explicit(clipboard, &message.text);
        match status {
            CopyStatus::Copied => {
                writeln!(out, "{}: {}", status.label(), preview_line(&message.text))?;
            }
            CopyStatus::Failed { .. } => {
                writeln!(out, "{}:", status.label())?;
                writeln!(out, "{}", message.text)?;
            }
        }
        out.flush()?;

        received += 1;
        if limit == Some(received) {
            break;
        }
    }
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::Arc;
    use streampad_core::{MemoryClipboard, MemoryStore};
    use streampad_server::{AppState, serve};

    const STREAM: &str = ": keep-alive\n\n\
        event: clipboard-sync\ndata: {\"text\":\"first\"}\n\n\
        event: change\ndata: {\"page\":\"home\"}\n\n\
        event: clipboard-sync\r\ndata: {\"text\":\"second\\nline\"}\r\n\r\n";

    #[test]
    fn test_sse_events_are_parsed() {
        let events: Vec<SseEvent> = SseEvents::new(Cursor::new(STREAM))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "clipboard-sync".into(),
                    data: r#"{"text":"first"}"#.into(),
                },
                SseEvent {
                    event: "change".into(),
                    data: r#"{"page":"home"}"#.into(),
                },
                SseEvent {
                    event: "clipboard-sync".into(),
                    data: r#"{"text":"second\nline"}"#.into(),
                },
            ]
        );
    }

    #[test]
    fn test_receive_copies_each_message() {
        let mut clipboard = MemoryClipboard::new();
        let mut out = Vec::new();
        let count = receive(SseEvents::new(Cursor::new(STREAM)), &mut clipboard, &mut out, None)
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(clipboard.contents(), Some("second\nline"));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Copied to clipboard: first\nCopied to clipboard: second...\n"
        );
    }

    #[test]
    fn test_failed_copy_shows_text_for_manual_copy() {
        let mut clipboard = MemoryClipboard::denying();
        let mut out = Vec::new();
        receive(SseEvents::new(Cursor::new(STREAM)), &mut clipboard, &mut out, Some(1)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Click to copy:\nfirst\n");
    }

    #[test]
    fn test_resolve_target() {
        let server = Url::parse(DEFAULT_SERVER).unwrap();
        let session = Uuid::new_v4();

        let (base, found) = resolve_target(&session.to_string(), &server).unwrap();
        assert_eq!((base, found), (server.clone(), session));

        let link = format!("https://pad.example.com/team/magic/mobile?s={session}");
        let (base, found) = resolve_target(&link, &server).unwrap();
        assert_eq!(base.as_str(), "https://pad.example.com/team/");
        assert_eq!(found, session);

        assert!(matches!(
            resolve_target("https://pad.example.com/magic/mobile", &server),
            Err(RelayError::Target(_))
        ));
        assert!(matches!(resolve_target("nope", &server), Err(RelayError::Target(_))));
    }

    #[test]
    fn test_empty_text_is_not_sent() {
        let client = RelayClient::new(Url::parse(DEFAULT_SERVER).unwrap()).unwrap();
        assert!(matches!(client.send(Uuid::new_v4(), ""), Err(RelayError::Empty)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_relay_through_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let public_url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let state = AppState::new(Arc::new(MemoryStore::new()), public_url.clone());
        tokio::spawn(serve(listener, state, std::future::pending()));

        tokio::task::spawn_blocking(move || {
            let desktop = RelayClient::new(public_url).unwrap();
            let opened = desktop.open_session().unwrap();
            let events = desktop.listen(opened.session).unwrap();

            let unused = Url::parse("http://127.0.0.1:9/").unwrap();
            let (base, session) = resolve_target(&opened.mobile_url, &unused).unwrap();
            assert_eq!(session, opened.session);
            let phone = RelayClient::new(base).unwrap();
            assert_eq!(phone.send(session, "from phone").unwrap(), 1);

            let mut clipboard = MemoryClipboard::new();
            let mut out = Vec::new();
            assert_eq!(receive(events, &mut clipboard, &mut out, Some(1)).unwrap(), 1);
            assert_eq!(clipboard.contents(), Some("from phone"));
            assert_eq!(String::from_utf8(out).unwrap(), "Copied to clipboard: from phone\n");
        })
        .await
        .unwrap();
    }
}
