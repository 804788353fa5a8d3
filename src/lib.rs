//! HTTP server for streampad pages.

pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod relay;
pub mod routes;

use std::future::Future;
use std::io;
use std::sync::Arc;

use streampad_core::{EntryStore, FileStore, MemoryStore};
use tokio::net::TcpListener;

pub use config::{ConfigError, ServerConfig, StorageKind};
pub use error::ApiError;
pub use feed::{ChangeFeed, PageChange};
pub use relay::RelayHub;
pub use routes::{AppState, router};

/// Build the entry store a config asks for.
pub fn open_store(config: &ServerConfig) -> Arc<dyn EntryStore> {
    match config.storage {
        StorageKind::File => Arc::new(FileStore::new(config.data_dir())),
        StorageKind::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(addr = %listener.local_addr()?, "streampad server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
