//! API emulation server
//!
//! Serves a captured log through the two conversation API methods a capture
//! uses, so a client can be tested against a log with no network access.
//! Every request reads the next page of the requested identity; pagination
//! cursors sent by the client are ignored. The returned `next_cursor` is the
//! offset of the record just served, which helps when debugging a client.

use std::io::{Read, Seek};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use convlog_core::Message;
use convlog_storage::{Player, StorageError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ReplayResult;

/// Player shared between request handlers
pub type SharedPlayer<R> = Arc<Mutex<Player<R>>>;

/// Shared application state
struct AppState<R> {
    player: SharedPlayer<R>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            player: self.player.clone(),
        }
    }
}

/// Parameters of `conversations.history`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub cursor: String,
}

/// Parameters of `conversations.replies`
#[derive(Debug, Default, Deserialize)]
pub struct RepliesParams {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub cursor: String,
}

#[derive(Debug, Serialize)]
struct ResponseMetadata {
    next_cursor: String,
}

/// Page of messages in the shape of the conversation API
#[derive(Debug, Serialize)]
struct PageResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    has_more: bool,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_metadata: Option<ResponseMetadata>,
}

impl PageResponse {
    fn page(messages: Vec<Message>, has_more: bool, offset: u64) -> Self {
        Self {
            ok: true,
            error: None,
            has_more,
            messages,
            response_metadata: Some(ResponseMetadata {
                next_cursor: offset.to_string(),
            }),
        }
    }

    fn end() -> Self {
        Self {
            ok: true,
            error: None,
            has_more: false,
            messages: Vec::new(),
            response_metadata: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
            ..Self::end()
        }
    }
}

/// Build the emulation routes over a shared player
pub fn router<R>(player: SharedPlayer<R>) -> Router
where
    R: Read + Seek + Send + 'static,
{
    Router::new()
        .route(
            "/api/conversations.history",
            get(history_query::<R>).post(history_form::<R>),
        )
        .route(
            "/api/conversations.replies",
            get(replies_query::<R>).post(replies_form::<R>),
        )
        .with_state(AppState { player })
}

async fn history_query<R: Read + Seek>(
    State(state): State<AppState<R>>,
    Query(params): Query<HistoryParams>,
) -> Response {
    history(&state.player, params)
}

async fn history_form<R: Read + Seek>(
    State(state): State<AppState<R>>,
    Form(params): Form<HistoryParams>,
) -> Response {
    history(&state.player, params)
}

async fn replies_query<R: Read + Seek>(
    State(state): State<AppState<R>>,
    Query(params): Query<RepliesParams>,
) -> Response {
    replies(&state.player, params)
}

async fn replies_form<R: Read + Seek>(
    State(state): State<AppState<R>>,
    Form(params): Form<RepliesParams>,
) -> Response {
    replies(&state.player, params)
}

fn history<R: Read + Seek>(player: &Mutex<Player<R>>, params: HistoryParams) -> Response {
    if params.channel.is_empty() {
        return (StatusCode::NOT_FOUND, "channel is required").into_response();
    }
    debug!(channel = %params.channel, cursor = %params.cursor, "conversations.history");

    let mut player = player.lock();
    match player.messages(&params.channel) {
        Ok(messages) => {
            let has_more = player.has_more_messages(&params.channel);
            Json(PageResponse::page(messages, has_more, player.offset())).into_response()
        }
        Err(StorageError::Exhausted(_)) => Json(PageResponse::end()).into_response(),
        Err(err) => error_response(err),
    }
}

fn replies<R: Read + Seek>(player: &Mutex<Player<R>>, params: RepliesParams) -> Response {
    if params.ts.is_empty() {
        return (StatusCode::BAD_REQUEST, "ts is required").into_response();
    }
    debug!(
        channel = %params.channel,
        ts = %params.ts,
        cursor = %params.cursor,
        "conversations.replies"
    );

    let mut player = player.lock();
    match player.thread(&params.channel, &params.ts) {
        Ok(messages) => {
            let has_more = player.has_more_threads(&params.channel, &params.ts);
            Json(PageResponse::page(messages, has_more, player.offset())).into_response()
        }
        Err(StorageError::Exhausted(_)) => Json(PageResponse::failed(format!(
            "thread_not_found[{}:{}]",
            params.channel, params.ts
        )))
        .into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: StorageError) -> Response {
    match err {
        StorageError::NotFound(id) => {
            (StatusCode::NOT_FOUND, format!("not found: {id}")).into_response()
        }
        err => {
            warn!(error = %err, "Player failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// A running emulation server
pub struct EmulationServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl EmulationServer {
    /// Bind `addr` and serve `player` in a background task
    pub async fn bind<A, R>(addr: A, player: Player<R>) -> ReplayResult<Self>
    where
        A: ToSocketAddrs,
        R: Read + Seek + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let name = player.name().to_string();
        let app = router(Arc::new(Mutex::new(player)));

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
        });
        info!(addr = %local_addr, log = %name, "Emulation server listening");

        Ok(Self {
            local_addr,
            shutdown: Some(tx),
            task,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL of the emulated API, ending in `/api/`
    pub fn api_url(&self) -> String {
        format!("http://{}/api/", self.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(mut self) -> ReplayResult<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result?,
            Err(e) => return Err(std::io::Error::other(e).into()),
        }
        info!(addr = %self.local_addr, "Emulation server stopped");
        Ok(())
    }
}
