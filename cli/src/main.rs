mod layout;
mod pager;
mod pick;
mod relay_client;
mod system_clipboard;

use clap::{Parser, Subcommand};
use fuzzypicker::FuzzyPicker;
use serde::Deserialize;
use std::env;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use streampad_core::clipboard::copy_explicit;
use streampad_core::entry::DEFAULT_PAGE;
use streampad_core::render::{DetailSegment, detail_segments};
use streampad_core::{EntryStore, FileStore, PageName, StreamDocument};
use streampad_core::Clipboard;
use tracing_subscriber::EnvFilter;
use url::Url;
use uuid::Uuid;

use crate::pick::PickExit;
use crate::relay_client::{DEFAULT_SERVER, RelayClient, receive, resolve_target};

#[derive(Parser, Debug)]
#[command(name = "streampad")]
#[command(about = "Shared clipboard pages in the terminal", long_about = None)]
struct Args {
    /// Directory holding the page files (default: the per-user data directory)
    #[arg(short = 'd', long = "directory", value_name = "DIRECTORY")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Page to open (for the default pick command)
    page: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Remove every entry of a page
    Clear { page: Option<String> },
    /// Copy the latest entry of a page to the clipboard
    Copy { page: Option<String> },
    /// Edit the whole stream of a page in $EDITOR
    Edit { page: Option<String> },
    /// List pages
    Ls,
    /// Open a page and copy words and ranges by clicking them
    Pick { page: Option<String> },
    /// Pass clipboard text between devices through a server
    Relay {
        /// Server URL (default: `server` from ~/.streampadrc or the local server)
        #[arg(short = 's', long = "server", value_name = "URL", global = true)]
        server: Option<String>,

        #[command(subcommand)]
        action: RelayAction,
    },
    /// Add an entry to a page (reads stdin without content)
    Post {
        page: Option<String>,
        content: Option<String>,
    },
    /// Show one entry with its links spelled out
    Show { id: String },
    /// List the entries of a page, newest first
    View { page: Option<String> },
}

#[derive(Subcommand, Debug)]
enum RelayAction {
    /// Open a session and copy every text sent to it
    Receive,
    /// Send text (default: the clipboard) to a session id or link
    Send {
        target: String,
        text: Option<String>,
    },
}

#[derive(Deserialize, Debug, Default)]
struct Config {
    directory: Option<PathBuf>,
    default_page: Option<String>,
    server: Option<String>,
}

impl Config {
    fn load() -> Self {
        if let Some(path) = Self::config_path()
            && path.exists()
            && let Ok(contents) = fs::read_to_string(&path)
        {
            match toml::from_str::<Config>(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), "ignoring invalid config: {}", e),
            }
        }
        Config::default()
    }

    fn config_path() -> Option<PathBuf> {
        env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".streampadrc"))
    }

    fn default_page(&self) -> Result<PageName, String> {
        PageName::parse(Some(self.default_page.as_deref().unwrap_or(DEFAULT_PAGE)))
            .map_err(|e| e.to_string())
    }
}

fn get_server(flag: Option<String>, config: &Config) -> Result<Url, String> {
    let raw = flag
        .or_else(|| config.server.clone())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let mut url = Url::parse(&raw).map_err(|e| format!("Invalid server URL '{}': {}", raw, e))?;
    // Relative joins need the base to read as a directory.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn get_data_dir(dir_opt: Option<PathBuf>, config: &Config) -> PathBuf {
    dir_opt
        .or_else(|| config.directory.clone())
        .or_else(FileStore::default_dir)
        .unwrap_or_else(|| PathBuf::from(".streampad"))
}

fn get_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| "vim".to_string())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn interactive_select(store: &dyn EntryStore) -> Result<Option<PageName>, String> {
    let pages: Vec<String> = store
        .pages()
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(String::from)
        .collect();

    if pages.is_empty() {
        return Ok(None);
    }

    let mut picker = FuzzyPicker::new(&pages);
    match picker.pick() {
        Ok(Some(name)) => PageName::parse(Some(&name))
            .map(Some)
            .map_err(|e| e.to_string()),
        Ok(None) => Ok(None),
        Err(e) => Err(format!("Failed to run fuzzy picker: {}", e)),
    }
}

/// Page named on the command line, picked interactively, or the default page.
///
/// `None` means the user aborted the picker.
fn resolve_page(
    name: Option<String>,
    store: &dyn EntryStore,
    config: &Config,
) -> Result<Option<PageName>, String> {
    if let Some(name) = name {
        return PageName::parse(Some(&name)).map(Some).map_err(|e| e.to_string());
    }
    if io::stdin().is_terminal() && !store.pages().map_err(|e| e.to_string())?.is_empty() {
        return interactive_select(store);
    }
    config.default_page().map(Some)
}

fn cmd_ls(store: &dyn EntryStore) -> Result<(), String> {
    for page in store.pages().map_err(|e| e.to_string())? {
        println!("{}", page);
    }
    Ok(())
}

fn cmd_view(page: &PageName, store: &dyn EntryStore) -> Result<(), String> {
    let entries = store.list(page).map_err(|e| e.to_string())?;
    if entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }

    let mut listing = String::new();
    for entry in &entries {
        listing.push_str(&format!("{}  {}\n", entry.id, entry.preview()));
    }
    pager::page_output(page.as_str(), &listing)
}

fn cmd_show(id: &str, store: &dyn EntryStore) -> Result<(), String> {
    let id = Uuid::parse_str(id).map_err(|e| format!("Invalid entry id '{}': {}", id, e))?;
    let entry = store
        .get(id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No entry with id {}", id))?;

    let mut text = String::new();
    for segment in detail_segments(&entry.content) {
        match segment {
            DetailSegment::Text(plain) => text.push_str(plain),
            DetailSegment::Link { href, display } => {
                text.push_str(&format!("{} <{}>", display, href));
            }
        }
    }
    if !text.ends_with('\n') {
        text.push('\n');
    }
    pager::page_output(&format!("{} {}", entry.page_name, entry.created_at), &text)
}

fn cmd_post(
    page: &PageName,
    content: Option<String>,
    store: &dyn EntryStore,
) -> Result<(), String> {
    let content = match content {
        Some(content) => content,
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            // Drop the newline that `echo` and friends add.
            match input.strip_suffix('\n') {
                Some(stripped) => stripped.to_string(),
                None => input,
            }
        }
    };
    if content.is_empty() {
        return Err("Missing content".to_string());
    }

    let entry = store.post(page, content).map_err(|e| e.to_string())?;
    tracing::info!(page = %page, id = %entry.id, "posted entry");
    println!("{}", entry.id);
    Ok(())
}

fn cmd_edit(page: &PageName, store: &dyn EntryStore) -> Result<(), String> {
    let mut doc = StreamDocument::load(store, page).map_err(|e| e.to_string())?;

    let mut file = tempfile::Builder::new()
        .prefix(&format!("streampad-{}-", page))
        .suffix(".txt")
        .tempfile()
        .map_err(|e| format!("Failed to create temporary file: {}", e))?;
    file.write_all(doc.text().as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| format!("Failed to write temporary file: {}", e))?;

    let editor = get_editor();
    let status = Command::new(&editor)
        .arg(file.path())
        .status()
        .map_err(|e| format!("Failed to open editor '{}': {}", editor, e))?;
    if !status.success() {
        return Err(format!("Editor exited with status: {}", status));
    }

    let mut edited = fs::read_to_string(file.path())
        .map_err(|e| format!("Failed to read edited text: {}", e))?;
    // Editors append a final newline the stream never had.
    if !doc.text().ends_with('\n') && edited.ends_with('\n') {
        edited.pop();
    }
    doc.set_text(edited);

    if doc.save(store).map_err(|e| e.to_string())? {
        println!("Saved page '{}'", page);
    } else {
        println!("No changes");
    }
    Ok(())
}

fn cmd_clear(page: &PageName, store: &dyn EntryStore) -> Result<(), String> {
    let deleted = store.delete_page(page).map_err(|e| e.to_string())?;
    println!("Deleted {} entries from page '{}'", deleted, page);
    Ok(())
}

fn cmd_copy(page: &PageName, store: &dyn EntryStore) -> Result<(), String> {
    let latest = store
        .latest(page)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Page '{}' has no entries", page))?;

    let mut clipboard = system_clipboard::SystemClipboard::new().map_err(|e| e.to_string())?;
    let status = copy_explicit(&mut clipboard, &latest.content);
    println!("{}", status.label());
    if status.is_copied() {
        Ok(())
    } else {
        Err(format!("Could not copy the latest entry of '{}'", page))
    }
}

fn cmd_relay_receive(server: Url) -> Result<(), String> {
    let client = RelayClient::new(server).map_err(|e| e.to_string())?;
    let opened = client.open_session().map_err(|e| e.to_string())?;
    println!("Open on your phone: {}", opened.mobile_url);
    println!("Session: {}", opened.session);

    let events = client.listen(opened.session).map_err(|e| e.to_string())?;
    let mut clipboard = system_clipboard::SystemClipboard::new().map_err(|e| e.to_string())?;
    receive(events, &mut clipboard, &mut io::stdout(), None).map_err(|e| e.to_string())?;
    Ok(())
}

fn cmd_relay_send(target: &str, text: Option<String>, server: Url) -> Result<(), String> {
    let (base, session) = resolve_target(target, &server).map_err(|e| e.to_string())?;
    let text = match text {
        Some(text) => text,
        None => system_clipboard::SystemClipboard::new()
            .and_then(|mut clipboard| clipboard.read_text())
            .map_err(|e| format!("Failed to read the clipboard: {}", e))?,
    };

    let client = RelayClient::new(base).map_err(|e| e.to_string())?;
    match client.send(session, &text).map_err(|e| e.to_string())? {
        0 => Err(format!("Nobody is listening on session {}", session)),
        delivered => {
            println!("Delivered to {} listener(s)", delivered);
            Ok(())
        }
    }
}

fn cmd_pick(page: &PageName, store: &FileStore) -> Result<(), String> {
    loop {
        let clipboard = system_clipboard::open_or_fallback();
        match pick::run(store, page, clipboard, Some(store.base_path()))? {
            PickExit::Quit => return Ok(()),
            PickExit::Edit => cmd_edit(page, store)?,
        }
    }
}

/// Run `action` on the page the user named or picks.
fn with_page(
    name: Option<String>,
    store: &FileStore,
    config: &Config,
    action: impl FnOnce(&PageName) -> Result<(), String>,
) -> Result<(), String> {
    match resolve_page(name, store, config)? {
        Some(page) => action(&page),
        None => Ok(()),
    }
}

fn run(args: Args, config: &Config, data_dir: &Path) -> Result<(), String> {
    let store = FileStore::new(data_dir.to_path_buf());

    match args.command {
        Some(Commands::Ls) => cmd_ls(&store),
        Some(Commands::View { page }) => {
            with_page(page, &store, config, |page| cmd_view(page, &store))
        }
        Some(Commands::Show { id }) => cmd_show(&id, &store),
        Some(Commands::Post { page, content }) => {
            let page = match page {
                Some(name) => PageName::parse(Some(&name)).map_err(|e| e.to_string())?,
                None => config.default_page()?,
            };
            cmd_post(&page, content, &store)
        }
        Some(Commands::Edit { page }) => {
            with_page(page, &store, config, |page| cmd_edit(page, &store))
        }
        Some(Commands::Clear { page }) => {
            with_page(page, &store, config, |page| cmd_clear(page, &store))
        }
        Some(Commands::Copy { page }) => {
            with_page(page, &store, config, |page| cmd_copy(page, &store))
        }
        Some(Commands::Pick { page }) => {
            with_page(page, &store, config, |page| cmd_pick(page, &store))
        }
        Some(Commands::Relay { server, action }) => {
            let server = get_server(server, config)?;
            match action {
                RelayAction::Receive => cmd_relay_receive(server),
                RelayAction::Send { target, text } => cmd_relay_send(&target, text, server),
            }
        }
        None => {
            with_page(args.page, &store, config, |page| cmd_pick(page, &store))
        }
    }
}

fn main() {
    init_logging();
    let config = Config::load();
    let args = Args::parse();
    let data_dir = get_data_dir(args.directory.clone(), &config);

    if !data_dir.exists()
        && let Err(e) = fs::create_dir_all(&data_dir)
    {
        eprintln!(
            "Error: Failed to create data directory '{}': {}",
            data_dir.display(),
            e
        );
        std::process::exit(1);
    }

    if let Err(e) = run(args, &config, &data_dir) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_parses() {
        let config: Config =
            toml::from_str("directory = \"/tmp/pads\"\ndefault_page = \"Inbox\"").unwrap();
        assert_eq!(get_data_dir(None, &config), PathBuf::from("/tmp/pads"));
        assert_eq!(config.default_page().unwrap().as_str(), "inbox");
    }

    #[test]
    fn test_directory_flag_wins() {
        let config = Config {
            directory: Some(PathBuf::from("/from/config")),
            default_page: None,
            server: None,
        };
        assert_eq!(
            get_data_dir(Some(PathBuf::from("/from/flag")), &config),
            PathBuf::from("/from/flag")
        );
        assert_eq!(config.default_page().unwrap().as_str(), "home");
    }

    #[test]
    fn test_reserved_default_page_is_an_error() {
        let config = Config {
            directory: None,
            default_page: Some("api".to_string()),
            server: None,
        };
        assert!(config.default_page().is_err());
    }

    #[test]
    fn test_args_default_to_pick() {
        let args = Args::parse_from(["streampad", "work"]);
        assert!(args.command.is_none());
        assert_eq!(args.page.as_deref(), Some("work"));

        let args = Args::parse_from(["streampad", "-d", "/tmp/x", "post", "notes", "hello"]);
        match args.command {
            Some(Commands::Post { page, content }) => {
                assert_eq!(page.as_deref(), Some("notes"));
                assert_eq!(content.as_deref(), Some("hello"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_server_flag_and_config() {
        let config: Config = toml::from_str("server = \"https://pad.example.com/team\"").unwrap();
        assert_eq!(
            get_server(None, &config).unwrap().as_str(),
            "https://pad.example.com/team/"
        );
        assert_eq!(
            get_server(Some("http://10.0.0.2:9000".into()), &config).unwrap().as_str(),
            "http://10.0.0.2:9000/"
        );
        assert_eq!(get_server(None, &Config::default()).unwrap().as_str(), DEFAULT_SERVER);
        assert!(get_server(Some("not a url".into()), &config).is_err());
    }

    #[test]
    fn test_relay_args() {
        let args = Args::parse_from(["streampad", "relay", "send", "--server", "http://x/", "abc"]);
        match args.command {
            Some(Commands::Relay {
                server,
                action: RelayAction::Send { target, text },
            }) => {
                assert_eq!(server.as_deref(), Some("http://x/"));
                assert_eq!(target, "abc");
                assert_eq!(text, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
