//! Clipboard relay between a phone and a desktop.
//!
//! A desktop opens a session and shows its mobile URL. The phone posts
//! clipboard text to the session and every desktop listening on it receives
//! the text as an event. Nothing is stored.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use url::Url;
use uuid::Uuid;

const SESSION_CAPACITY: usize = 16;
const MOBILE_PATH: &str = "magic/mobile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    #[serde(default)]
    pub text: String,
}

type Sessions = HashMap<Uuid, broadcast::Sender<RelayMessage>>;

#[derive(Debug, Default)]
pub struct RelayHub {
    sessions: Mutex<Sessions>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the session map, dropping every session without listeners
    /// except `keep`.
    fn sessions(&self, keep: Option<Uuid>) -> MutexGuard<'_, Sessions> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|id, tx| Some(*id) == keep || tx.receiver_count() > 0);
        sessions
    }

    pub fn open_session(&self) -> Uuid {
        let session = Uuid::new_v4();
        let (tx, _) = broadcast::channel(SESSION_CAPACITY);
        self.sessions(Some(session)).insert(session, tx);
        tracing::info!(%session, "opened relay session");
        session
    }

    pub fn subscribe(&self, session: Uuid) -> broadcast::Receiver<RelayMessage> {
        self.sessions(Some(session))
            .entry(session)
            .or_insert_with(|| broadcast::channel(SESSION_CAPACITY).0)
            .subscribe()
    }

    /// Messages for a session; a listener that falls behind skips ahead.
    pub fn stream(&self, session: Uuid) -> impl Stream<Item = RelayMessage> + Send + use<> {
        BroadcastStream::new(self.subscribe(session)).filter_map(Result::ok)
    }

    /// Deliver a message and return how many listeners received it.
    pub fn send(&self, session: Uuid, message: RelayMessage) -> usize {
        let delivered = self
            .sessions(Some(session))
            .get(&session)
            .and_then(|tx| tx.send(message).ok())
            .unwrap_or(0);
        tracing::debug!(%session, delivered, "relayed clipboard text");
        delivered
    }

    /// Sessions that still have listeners.
    pub fn session_count(&self) -> usize {
        self.sessions(None).len()
    }
}

/// URL a phone opens to join `session`.
pub fn mobile_url(base: &Url, session: Uuid) -> Result<Url, url::ParseError> {
    let mut url = base.join(MOBILE_PATH)?;
    url.query_pairs_mut().append_pair("s", &session.to_string());
    Ok(url)
}
