//! Change notifications for a [`FileStore`](crate::store::FileStore) directory.
//!
//! Whoever receives a change reloads the affected page from scratch; no
//! attempt is made to describe what changed inside the page.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::entry::PageName;
use crate::store::FileStore;

const WATCHER_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    raw_event_rx: mpsc::Receiver<notify::Event>,
    base_path: PathBuf,
}

impl StoreWatcher {
    /// Watch `base_path`, creating it first if needed.
    pub fn new(base_path: &Path) -> Result<Self, notify::Error> {
        std::fs::create_dir_all(base_path)?;
        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                let Ok(event) = res else { return };
                let _ = tx.send(event);
            },
            Config::default().with_poll_interval(WATCHER_POLL_INTERVAL),
        )?;
        watcher.watch(base_path, RecursiveMode::NonRecursive)?;
        Ok(StoreWatcher {
            _watcher: watcher,
            raw_event_rx: rx,
            base_path: base_path.to_path_buf(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Pages touched since the last call, without blocking.
    pub fn drain(&self) -> BTreeSet<PageName> {
        let mut pages = BTreeSet::new();
        while let Ok(event) = self.raw_event_rx.try_recv() {
            pages.extend(pages_in_event(&event));
        }
        pages
    }

    /// Wait up to `timeout` for the next batch of changed pages.
    ///
    /// Returns `None` once the watcher is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BTreeSet<PageName>> {
        match self.raw_event_rx.recv_timeout(timeout) {
            Ok(event) => {
                let mut pages: BTreeSet<PageName> = pages_in_event(&event).collect();
                pages.extend(self.drain());
                Some(pages)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Some(BTreeSet::new()),
            Err(mpsc::RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn pages_in_event(event: &notify::Event) -> impl Iterator<Item = PageName> + '_ {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    event
        .paths
        .iter()
        .filter(move |_| relevant)
        .filter_map(|path| FileStore::page_for_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntryStore;
    use std::time::Instant;

    #[test]
    fn test_event_paths_map_to_pages() {
        let event = notify::Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/data/home.json"))
            .add_path(PathBuf::from("/data/home.json.tmp"))
            .add_path(PathBuf::from("/data/notes.json"));
        let pages: Vec<String> = pages_in_event(&event).map(String::from).collect();
        assert_eq!(pages, vec!["home", "notes"]);
    }

    #[test]
    fn test_access_events_are_ignored() {
        let event = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/data/home.json"));
        assert_eq!(pages_in_event(&event).count(), 0);
    }

    #[test]
    fn test_reports_writes_to_page_files() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = StoreWatcher::new(dir.path()).unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let page = PageName::parse(Some("watched")).unwrap();

        store.post(&page, "hello".into()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = BTreeSet::new();
        while !seen.contains(&page) && Instant::now() < deadline {
            match watcher.recv_timeout(Duration::from_millis(100)) {
                Some(pages) => seen.extend(pages),
                None => break,
            }
        }
        assert!(seen.contains(&page));
    }
}
