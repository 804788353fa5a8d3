use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use streampad_server::{AppState, ServerConfig, StorageKind, logging, open_store, serve};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "streampad-server")]
#[command(about = "Serve streampad pages over HTTP", long_about = None)]
struct Args {
    /// Config file (default: server.toml in the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Directory holding the page files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Keep entries in memory only
    #[arg(long)]
    memory: bool,

    /// Do not watch the data directory for changes by other processes
    #[arg(long)]
    no_watch: bool,

    /// Base URL phones use to reach this server
    #[arg(long)]
    public_url: Option<String>,
}

impl Args {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        if self.memory {
            config.storage = StorageKind::Memory;
        }
        if self.no_watch {
            config.watch = false;
        }
        if let Some(url) = self.public_url {
            config.public_url = Some(url);
        }
        config
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::load(args.config.as_deref())?;
    let config = args.apply(config);
    logging::init(&config.log);

    let store = open_store(&config);
    let mut state = AppState::new(store, config.public_url()?);

    if config.watch && config.storage == StorageKind::File {
        let dir = config.data_dir();
        match state.feed.watch_directory(&dir) {
            Ok(()) => state.announce_writes = false,
            Err(err) => {
                tracing::warn!(%err, dir = %dir.display(), "not watching data directory");
            }
        }
    }

    let listener = TcpListener::bind(config.listen).await?;
    serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
