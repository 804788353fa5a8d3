//! HTTP surface: entry CRUD, stream markup, change feed and relay.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use streampad_core::entry::join_stream;
use streampad_core::render::{render_detail_html, render_stream_html};
use streampad_core::{Entry, EntryStore, PageName, StoreError};
use tokio_stream::{Stream, StreamExt};
use url::Url;
use uuid::Uuid;

use crate::error::ApiError;
use crate::feed::ChangeFeed;
use crate::relay::{RelayHub, RelayMessage, mobile_url};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntryStore>,
    pub feed: ChangeFeed,
    pub relay: Arc<RelayHub>,
    pub public_url: Url,
    /// Whether handlers publish their own writes. Off while a directory
    /// watcher already reports every write to the store.
    pub announce_writes: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn EntryStore>, public_url: Url) -> Self {
        AppState {
            store,
            feed: ChangeFeed::new(),
            relay: Arc::new(RelayHub::new()),
            public_url,
            announce_writes: true,
        }
    }

    fn announce(&self, page: &PageName) {
        if self.announce_writes {
            self.feed.publish(page);
        }
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EntryStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        Ok(result?)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/entries",
            get(list_entries).put(replace_entries).delete(delete_entries),
        )
        .route("/api/entries/{id}", get(get_entry))
        .route("/api/entries/{id}/html", get(get_entry_html))
        .route("/api/post", post(post_entry))
        .route("/api/copy", get(copy_latest))
        .route("/api/stream", get(stream_html))
        .route("/api/changes", get(changes))
        .route("/api/relay", post(open_relay))
        .route("/api/relay/{session}", get(relay_events).post(relay_send))
        .layer(middleware::from_fn(cors))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    tracing::debug!(%method, path, status = response.status().as_u16(), "handled request");
    response
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<String>,
    mode: Option<String>,
}

impl PageQuery {
    fn page(&self) -> Result<PageName, ApiError> {
        Ok(PageName::parse(self.page.as_deref())?)
    }
}

#[derive(Debug, Deserialize)]
struct ReplaceRequest {
    #[serde(rename = "pageName")]
    page_name: Option<String>,
    contents: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PostRequest {
    #[serde(rename = "pageName")]
    page_name: Option<String>,
    content: Option<String>,
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(%err, "rejecting request body");
        ApiError::BadRequest("Invalid JSON")
    })
}

fn plain_text(body: String) -> Response {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

/// Ids that do not parse cannot exist.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let page = query.page()?;
    match query.mode.as_deref() {
        Some("latest_text") => {
            let latest = state.with_store(move |store| store.latest(&page)).await?;
            Ok(plain_text(latest.map(|entry| entry.content).unwrap_or_default()))
        }
        Some("latest_json") => {
            let latest = state.with_store(move |store| store.latest(&page)).await?;
            Ok(Json(latest).into_response())
        }
        _ => {
            let entries = state.with_store(move |store| store.list(&page)).await?;
            Ok(Json(entries).into_response())
        }
    }
}

async fn replace_entries(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: ReplaceRequest = parse_json(&body)?;
    let page = PageName::parse(request.page_name.as_deref())?;
    let contents = request.contents.unwrap_or_default();

    let changed = page.clone();
    state
        .with_store(move |store| store.replace_page(&page, &contents))
        .await?;
    state.announce(&changed);
    Ok(Json(json!({ "success": true })))
}

async fn delete_entries(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = query.page()?;
    let changed = page.clone();
    let deleted = state
        .with_store(move |store| store.delete_page(&page))
        .await?;
    tracing::info!(page = %changed, deleted, "deleted page entries");
    state.announce(&changed);
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted all entries for page '{changed}'"),
    })))
}

async fn post_entry(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: PostRequest = parse_json(&body)?;
    let content = request
        .content
        .filter(|content| !content.is_empty())
        .ok_or(ApiError::BadRequest("Missing content"))?;
    let page = PageName::parse(request.page_name.as_deref())?;

    let changed = page.clone();
    let entry = state
        .with_store(move |store| store.post(&page, content))
        .await?;
    state.announce(&changed);
    Ok(Json(json!({ "success": true, "id": entry.id })))
}

async fn find_entry(state: &AppState, raw_id: &str) -> Result<Entry, ApiError> {
    let id = parse_id(raw_id)?;
    state
        .with_store(move |store| store.get(id))
        .await?
        .ok_or(ApiError::NotFound)
}

async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Entry>, ApiError> {
    Ok(Json(find_entry(&state, &id).await?))
}

async fn get_entry_html(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let entry = find_entry(&state, &id).await?;
    Ok(Html(render_detail_html(&entry.content)))
}

async fn copy_latest(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let page = query.page()?;
    let latest = state.with_store(move |store| store.latest(&page)).await?;
    Ok(plain_text(latest.map(|entry| entry.content).unwrap_or_default()))
}

async fn stream_html(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ApiError> {
    let page = query.page()?;
    let entries = state.with_store(move |store| store.list(&page)).await?;
    Ok(Html(render_stream_html(&join_stream(&entries), None)))
}

async fn changes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state.feed.stream().filter_map(|change| {
        Event::default()
            .event("change")
            .json_data(change)
            .ok()
            .map(Ok)
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn open_relay(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.relay.open_session();
    let url = mobile_url(&state.public_url, session)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(json!({ "session": session, "mobileUrl": url.as_str() })))
}

async fn relay_events(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = parse_id(&session)?;
    let events = state.relay.stream(session).filter_map(|message| {
        Event::default()
            .event("clipboard-sync")
            .json_data(message)
            .ok()
            .map(Ok)
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn relay_send(
    State(state): State<AppState>,
    Path(session): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = parse_id(&session)?;
    let message: RelayMessage = parse_json(&body)?;
    if message.text.is_empty() {
        return Err(ApiError::BadRequest("Missing text"));
    }
    let delivered = state.relay.send(session, message);
    Ok(Json(json!({ "delivered": delivered })))
}
