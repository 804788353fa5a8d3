//! Change notifications for connected clients.
//!
//! Every mutation goes out as a [`PageChange`]. Clients re-fetch the page
//! themselves, so a subscriber that falls behind is only told that something
//! changed.

use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use streampad_core::{PageName, StoreWatcher};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

const FEED_CAPACITY: usize = 64;
const WATCH_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageChange {
    /// Changed page, or `None` when the subscriber missed changes and should
    /// reload everything.
    pub page: Option<String>,
}

impl PageChange {
    pub fn page(page: &PageName) -> Self {
        PageChange {
            page: Some(page.to_string()),
        }
    }

    pub fn everything() -> Self {
        PageChange { page: None }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<PageChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        ChangeFeed { tx }
    }

    pub fn publish(&self, page: &PageName) {
        // No subscribers is not an error.
        let receivers = self.tx.send(PageChange::page(page)).unwrap_or(0);
        tracing::debug!(%page, receivers, "published page change");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageChange> {
        self.tx.subscribe()
    }

    pub fn stream(&self) -> impl Stream<Item = PageChange> + Send + use<> {
        BroadcastStream::new(self.subscribe()).map(|item| match item {
            Ok(change) => change,
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::debug!(missed, "change subscriber lagged");
                PageChange::everything()
            }
        })
    }

    /// Publish changes that other processes make to a file store directory.
    ///
    /// The watcher runs on its own thread for the lifetime of the process.
    pub fn watch_directory(&self, dir: &Path) -> Result<(), notify::Error> {
        let watcher = StoreWatcher::new(dir)?;
        let feed = self.clone();
        thread::Builder::new()
            .name("store-watcher".to_string())
            .spawn(move || {
                tracing::info!(dir = %watcher.base_path().display(), "watching data directory");
                while let Some(pages) = watcher.recv_timeout(WATCH_POLL) {
                    for page in pages {
                        feed.publish(&page);
                    }
                }
                tracing::warn!("data directory watcher stopped");
            })
            .map_err(notify::Error::io)?;
        Ok(())
    }
}
