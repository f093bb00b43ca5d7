//! HTTP request handlers

use super::AppContext;
use crate::error::ApiResult;
use crate::reconciler::Phase;
use crate::votes::{ProposeRequest, VoteRequest};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use kjb_common::{JukeboxState, LibraryItem};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub phase: Phase,
    pub library_size: usize,
    pub queue_length: usize,
    pub observers: usize,
    pub revision: u64,
    pub now_playing: Option<LibraryItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LibraryQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub files: Vec<LibraryItem>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub files: usize,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "kjb-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/status - reconciler phase and aggregate counters
pub async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let (queue_length, revision, now_playing) = ctx
        .store
        .read(|state| (state.queue.len(), state.revision, state.now_playing.clone()))
        .await;
    let phase = *ctx.phase.borrow();

    Json(StatusResponse {
        phase,
        library_size: ctx.library.len(),
        queue_length,
        observers: ctx.store.observer_count(),
        revision,
        now_playing,
    })
}

/// GET /api/library?q= - library items, optionally filtered by label
pub async fn library(
    State(ctx): State<AppContext>,
    query: Result<Query<LibraryQuery>, QueryRejection>,
) -> ApiResult<Json<LibraryResponse>> {
    let Query(query) = query?;
    let files = match query.q.as_deref() {
        Some(q) => ctx.library.search(q),
        None => ctx.library.items().as_ref().clone(),
    };
    Ok(Json(LibraryResponse { files }))
}

/// POST /api/library/refresh - reload the library from the player
pub async fn refresh_library(State(ctx): State<AppContext>) -> ApiResult<Json<RefreshResponse>> {
    let files = ctx
        .library
        .refresh(ctx.gateway.as_ref(), &ctx.library_directory)
        .await?;
    info!("Library refreshed on request: {} items", files);
    Ok(Json(RefreshResponse { files }))
}

/// POST /api/propose - add a library item to the queue
pub async fn propose(
    State(ctx): State<AppContext>,
    payload: Result<Json<ProposeRequest>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let Json(request) = payload?;
    ctx.votes.propose(request).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/vote - vote for a queued item
pub async fn vote(
    State(ctx): State<AppContext>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let Json(request) = payload?;
    ctx.votes.vote(request).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/state - current aggregate
pub async fn get_state(State(ctx): State<AppContext>) -> Json<JukeboxState> {
    Json(ctx.store.snapshot().await)
}
