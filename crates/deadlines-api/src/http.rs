//! HTTP front-end: every resource path is served under `/`, plus backup,
//! restore, the due-soon digest and a change feed.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query as UrlQuery, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, warn};

use deadlines_db::{Column, DbError, Filter, Sort};
use deadlines_types::route::ROOT;
use deadlines_types::{ChangeEvent, DeadlineUpdate, NewDeadline, Route};

use crate::backup;
use crate::error::{Error, Operation};
use crate::notify::Dispatcher;
use crate::provider::{Provider, Query};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub provider: Provider,
    pub dispatcher: Dispatcher,
    pub backup_path: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/backup", get(get_backup).post(write_backup))
        .route("/restore", post(restore))
        .route("/due-soon", get(due_soon))
        .route("/changes", get(changes))
        .route(
            "/{*path}",
            get(query_route)
                .post(insert)
                .put(update)
                .delete(delete),
        )
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::UnrecognizedRoute(_) => StatusCode::NOT_FOUND,
            Error::InvalidOperationForRoute { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Error::MalformedBackupRecord { .. } | Error::BackupUnreadable(_) => StatusCode::BAD_REQUEST,
            Error::InsertFailed(_) | Error::Storage(DbError::Constraint(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::BackupWrite(_) | Error::Storage(_) => {
                error!("Request failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Runs a storage call off the async runtime.
async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Provider) -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.provider))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}

fn route_of(uri: &Uri) -> ApiResult<Route> {
    Route::parse(uri.path()).map_err(|e| ApiError::from(Error::from(e)))
}

/// Resolves the route for a write and checks it accepts `operation`, so an
/// unknown path or a list route is reported before the body is looked at.
fn write_route(uri: &Uri, operation: Operation) -> ApiResult<Route> {
    let route = route_of(uri)?;
    operation.check(&route)?;
    Ok(route)
}

fn json_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid body: {e}")))
}

/// Query-string options for reads: `sort=due_date:desc,label`,
/// `columns=label,done`, `due_before`, `due_after`, `done=0|1`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub sort: Option<String>,
    pub columns: Option<String>,
    pub due_before: Option<i64>,
    pub due_after: Option<i64>,
    pub done: Option<u8>,
}

impl ListParams {
    pub fn into_query(self) -> ApiResult<Query> {
        let mut query = Query::default();

        if let Some(sort) = &self.sort {
            for term in sort.split(',').filter(|t| !t.is_empty()) {
                let (name, direction) = term.split_once(':').unwrap_or((term, "asc"));
                let column = parse_column(name)?;
                query.sort.push(match direction {
                    "asc" => Sort::asc(column),
                    "desc" => Sort::desc(column),
                    other => return Err(ApiError::bad_request(format!("bad sort direction: {other}"))),
                });
            }
        }

        if let Some(columns) = &self.columns {
            let columns = columns
                .split(',')
                .filter(|c| !c.is_empty())
                .map(parse_column)
                .collect::<ApiResult<Vec<_>>>()?;
            query.columns = Some(columns);
        }

        let mut filters = Vec::new();
        if let Some(ms) = self.due_before {
            filters.push(Filter::DueOnOrBefore(ms));
        }
        if let Some(ms) = self.due_after {
            filters.push(Filter::DueAfter(ms));
        }
        match self.done {
            None => {}
            Some(0) => filters.push(Filter::Done(false)),
            Some(1) => filters.push(Filter::Done(true)),
            Some(n) => return Err(ApiError::bad_request(format!("done must be 0 or 1, got {n}"))),
        }
        if !filters.is_empty() {
            query.filter = Some(Filter::All(filters));
        }

        Ok(query)
    }
}

fn parse_column(name: &str) -> ApiResult<Column> {
    Column::from_name(name).ok_or_else(|| ApiError::bad_request(format!("unknown column: {name}")))
}

async fn query_route(
    State(state): State<AppState>,
    uri: Uri,
    UrlQuery(params): UrlQuery<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let route = route_of(&uri)?;
    let query = params.into_query()?;
    let result = blocking(&state, move |p| p.execute(&route, &query)).await?;
    Ok(Json(result))
}

async fn insert(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let route = write_route(&uri, Operation::Insert)?;
    let new: NewDeadline = json_body(&body)?;
    let id = blocking(&state, move |p| p.insert(&route, new)).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": id, "path": Route::Deadline(id).path() })),
    ))
}

async fn update(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let route = write_route(&uri, Operation::Update)?;
    let changes: DeadlineUpdate = json_body(&body)?;
    let affected = blocking(&state, move |p| p.update(&route, changes)).await?;
    Ok(Json(serde_json::json!({ "affected": affected })))
}

async fn delete(State(state): State<AppState>, uri: Uri) -> ApiResult<impl IntoResponse> {
    let route = write_route(&uri, Operation::Delete)?;
    let affected = blocking(&state, move |p| p.delete(&route)).await?;
    Ok(Json(serde_json::json!({ "affected": affected })))
}

async fn get_backup(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let text = blocking(&state, backup::backup_text).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

async fn write_backup(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let path = state.backup_path.clone();
    let written = path.clone();
    let records = blocking(&state, move |p| backup::write_backup_file(p, &written)).await?;
    Ok(Json(serde_json::json!({
        "path": path.display().to_string(),
        "records": records,
    })))
}

async fn restore(State(state): State<AppState>, body: String) -> ApiResult<impl IntoResponse> {
    let report = blocking(&state, move |p| backup::restore(p, body.as_bytes())).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct DueSoonParams {
    #[serde(default = "default_due_soon_limit")]
    pub limit: usize,
}

fn default_due_soon_limit() -> usize {
    5
}

async fn due_soon(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<DueSoonParams>,
) -> ApiResult<impl IntoResponse> {
    let digest = blocking(&state, move |p| p.due_soon(params.limit)).await?;
    Ok(Json(digest))
}

async fn changes(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| stream_changes(socket, dispatcher))
}

/// Forwards change events to one WebSocket client until either side closes.
async fn stream_changes(socket: WebSocket, dispatcher: Dispatcher) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = dispatcher.subscribe();
    debug!("Change feed subscriber connected");

    loop {
        tokio::select! {
            event = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    // Events carry no payload, so one stands in for all that were dropped.
                    Err(RecvError::Lagged(n)) => {
                        warn!("Change feed lagged by {} events", n);
                        ChangeEvent::new(ROOT)
                    }
                    Err(RecvError::Closed) => break,
                };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("Change feed subscriber disconnected");
}
