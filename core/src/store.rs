use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use directories::ProjectDirs;
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::entry::{Entry, PageName};

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "streampad";
const APPLICATION: &str = "streampad";
const PAGE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("page name '{0}' is reserved")]
    ReservedPage(String),
    #[error("invalid page name '{0}'")]
    InvalidPageName(String),
    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt page file '{}': {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage for the entries of all pages.
///
/// Listings are newest first. Entries inserted together by
/// [`EntryStore::insert_batch`] read back in the order they were given.
pub trait EntryStore: Send + Sync {
    /// Register a page so it shows up in listings even without entries.
    fn ensure_page(&self, page: &PageName) -> Result<(), StoreError>;

    fn pages(&self) -> Result<Vec<PageName>, StoreError>;

    fn list(&self, page: &PageName) -> Result<Vec<Entry>, StoreError>;

    fn get(&self, id: Uuid) -> Result<Option<Entry>, StoreError>;

    /// Add one entry as the newest of the page.
    fn append(&self, page: &PageName, content: String) -> Result<Entry, StoreError>;

    /// Add several entries; `contents[0]` becomes the newest.
    fn insert_batch(&self, page: &PageName, contents: &[String]) -> Result<Vec<Entry>, StoreError>;

    /// Remove every entry of the page. Returns how many were removed.
    fn delete_page(&self, page: &PageName) -> Result<usize, StoreError>;

    fn latest(&self, page: &PageName) -> Result<Option<Entry>, StoreError> {
        Ok(self.list(page)?.into_iter().next())
    }

    /// Append after registering the page. Registration failures are logged only.
    fn post(&self, page: &PageName, content: String) -> Result<Entry, StoreError> {
        if let Err(err) = self.ensure_page(page) {
            tracing::error!(%page, %err, "failed to register page");
        }
        self.append(page, content)
    }

    /// Replace all entries of a page.
    ///
    /// This deletes and then inserts; it is not atomic. A failure between
    /// the two steps leaves the page empty.
    fn replace_page(&self, page: &PageName, contents: &[String]) -> Result<(), StoreError> {
        if let Err(err) = self.ensure_page(page) {
            tracing::error!(%page, %err, "failed to register page");
        }
        self.delete_page(page)?;
        if !contents.is_empty() {
            self.insert_batch(page, contents)?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Page entries are kept oldest first; listings walk them backwards.
fn newest_first(entries: &[Entry]) -> Vec<Entry> {
    let mut listed: Vec<Entry> = entries.iter().rev().cloned().collect();
    listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    listed
}

fn build_batch(page: &PageName, contents: &[String]) -> Vec<Entry> {
    let now = Utc::now();
    contents
        .iter()
        .rev()
        .map(|content| Entry::new(page.clone(), content.clone(), now))
        .collect()
}

/// Process-local store, used for tests and `storage = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: Mutex<BTreeMap<PageName, Vec<Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntryStore for MemoryStore {
    fn ensure_page(&self, page: &PageName) -> Result<(), StoreError> {
        lock(&self.pages).entry(page.clone()).or_default();
        Ok(())
    }

    fn pages(&self) -> Result<Vec<PageName>, StoreError> {
        Ok(lock(&self.pages).keys().cloned().collect())
    }

    fn list(&self, page: &PageName) -> Result<Vec<Entry>, StoreError> {
        Ok(lock(&self.pages)
            .get(page)
            .map(|entries| newest_first(entries))
            .unwrap_or_default())
    }

    fn get(&self, id: Uuid) -> Result<Option<Entry>, StoreError> {
        Ok(lock(&self.pages)
            .values()
            .flatten()
            .find(|entry| entry.id == id)
            .cloned())
    }

    fn append(&self, page: &PageName, content: String) -> Result<Entry, StoreError> {
        let entry = Entry::new(page.clone(), content, Utc::now());
        lock(&self.pages)
            .entry(page.clone())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    fn insert_batch(&self, page: &PageName, contents: &[String]) -> Result<Vec<Entry>, StoreError> {
        let batch = build_batch(page, contents);
        lock(&self.pages)
            .entry(page.clone())
            .or_default()
            .extend(batch.iter().cloned());
        Ok(batch)
    }

    fn delete_page(&self, page: &PageName) -> Result<usize, StoreError> {
        Ok(lock(&self.pages)
            .get_mut(page)
            .map(|entries| entries.drain(..).count())
            .unwrap_or(0))
    }
}

/// Directory of JSON files, one per page.
pub struct FileStore {
    base_path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(base_path: PathBuf) -> Self {
        FileStore {
            base_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Per-user data directory, e.g. `~/.local/share/streampad` on Linux.
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .map(|dirs| dirs.data_dir().to_path_buf())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn page_path(&self, page: &PageName) -> PathBuf {
        self.base_path.join(format!("{page}.{PAGE_EXTENSION}"))
    }

    /// Page name for a file inside the store directory, if it is a page file.
    pub fn page_for_path(path: &Path) -> Option<PageName> {
        if path.extension().and_then(|s| s.to_str()) != Some(PAGE_EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        PageName::parse(Some(stem)).ok().filter(|p| p.as_str() == stem)
    }

    fn read_page(&self, page: &PageName) -> Result<Option<Vec<Entry>>, StoreError> {
        let path = self.page_path(page);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    fn write_page(&self, page: &PageName, entries: &[Entry]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_path).map_err(|source| StoreError::Io {
            path: self.base_path.clone(),
            source,
        })?;
        let path = self.page_path(page);
        let data = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        // Readers never lock, so the new contents are swapped in by rename.
        let mut file = NamedTempFile::new_in(&self.base_path).map_err(|source| StoreError::Io {
            path: self.base_path.clone(),
            source,
        })?;
        if let Err(source) = file.write_all(&data).and_then(|()| file.flush()) {
            return Err(StoreError::Io { path, source });
        }
        file.persist(&path)
            .map(|_| ())
            .map_err(|err| StoreError::Io {
                path,
                source: err.error,
            })
    }

    fn modify_page<T>(
        &self,
        page: &PageName,
        f: impl FnOnce(&mut Vec<Entry>) -> T,
    ) -> Result<T, StoreError> {
        let _guard = lock(&self.write_lock);
        let mut entries = self.read_page(page)?.unwrap_or_default();
        let result = f(&mut entries);
        self.write_page(page, &entries)?;
        Ok(result)
    }
}

impl EntryStore for FileStore {
    fn ensure_page(&self, page: &PageName) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        if self.read_page(page)?.is_none() {
            self.write_page(page, &[])?;
        }
        Ok(())
    }

    fn pages(&self) -> Result<Vec<PageName>, StoreError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut pages = Vec::new();
        for entry in WalkDir::new(&self.base_path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| StoreError::Io {
                path: self.base_path.clone(),
                source: err.into(),
            })?;
            if entry.file_type().is_file()
                && let Some(page) = Self::page_for_path(entry.path())
            {
                pages.push(page);
            }
        }
        pages.sort();
        Ok(pages)
    }

    fn list(&self, page: &PageName) -> Result<Vec<Entry>, StoreError> {
        Ok(self
            .read_page(page)?
            .map(|entries| newest_first(&entries))
            .unwrap_or_default())
    }

    fn get(&self, id: Uuid) -> Result<Option<Entry>, StoreError> {
        for page in self.pages()? {
            if let Some(entries) = self.read_page(&page)?
                && let Some(entry) = entries.into_iter().find(|e| e.id == id)
            {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn append(&self, page: &PageName, content: String) -> Result<Entry, StoreError> {
        let entry = Entry::new(page.clone(), content, Utc::now());
        self.modify_page(page, |entries| entries.push(entry.clone()))?;
        Ok(entry)
    }

    fn insert_batch(&self, page: &PageName, contents: &[String]) -> Result<Vec<Entry>, StoreError> {
        let batch = build_batch(page, contents);
        self.modify_page(page, |entries| entries.extend(batch.iter().cloned()))?;
        Ok(batch)
    }

    fn delete_page(&self, page: &PageName) -> Result<usize, StoreError> {
        let _guard = lock(&self.write_lock);
        match self.read_page(page)? {
            Some(entries) => {
                self.write_page(page, &[])?;
                Ok(entries.len())
            }
            None => Ok(0),
        }
    }
}
