//! HTTP entry points.
//!
//! The fetch handler is the request dispatcher of the pool subsystem: take
//! one board from the store, fall back to a synchronous inline generation
//! when the backlog is empty, then trigger an asynchronous replenishment so
//! the common case stays a single guarded take. Solving is stateless, and
//! the status view only reads counts.

use crate::server::auth::{TokenAuth, require_bearer};
use crate::server::config::ServerConfig;
use crate::server::error::{Result, ServiceError};
use crate::server::pool::manager::WorkerPool;
use crate::server::pool::worker::generate_job;
use crate::server::store::{PoolKey, PoolStore};
use crate::server::synth::Synthesize;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use lantern::{Board, Cell, Difficulty};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Board width or height when the query omits it.
const DEFAULT_DIM: u32 = 5;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<PoolStore>,
    pub pool: Arc<WorkerPool>,
    pub synth: Arc<dyn Synthesize>,
    pub auth: Arc<TokenAuth>,
}

/// Build the service router. Fetch and solve sit behind the bearer-token
/// layer; the status view is public.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/json", get(fetch_board))
        .route("/solve", post(solve_board))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/", get(backlog_status))
        .route("/index", get(backlog_status))
        .merge(protected)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Raw fetch parameters; dimensions are validated by hand so a bad value is
/// rejected instead of silently replaced.
#[derive(Debug, Deserialize)]
pub struct FetchParams {
    width: Option<String>,
    height: Option<String>,
    difficulty: Option<String>,
}

/// Fetch response: the board matrix plus the integer legend.
#[derive(Debug, Serialize, Deserialize)]
pub struct BoardPayload {
    pub empty: u8,
    pub barrier: u8,
    pub light: u8,
    pub numbers: Vec<u8>,
    pub board: Board,
}

impl BoardPayload {
    pub fn new(board: Board) -> Self {
        Self {
            empty: Cell::EMPTY_CODE,
            barrier: Cell::BARRIER_CODE,
            light: Cell::LIGHT_CODE,
            numbers: (0..=Cell::MAX_CLUE).collect(),
            board,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SolvePayload {
    pub board: Board,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub width: u32,
    pub height: u32,
    pub difficulty: Difficulty,
    pub count: usize,
}

async fn fetch_board(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> Result<Json<BoardPayload>> {
    let key = PoolKey {
        width: parse_dim("width", params.width.as_deref(), state.config.max_board_dim)?,
        height: parse_dim("height", params.height.as_deref(), state.config.max_board_dim)?,
        difficulty: params
            .difficulty
            .as_deref()
            .map_or_else(Difficulty::default, Difficulty::from_label),
    };

    let board = take_or_generate(&state, &key).await?;

    // restore the backlog off the request path; failures here surface only
    // as a lower count on the next fetch
    let pool = Arc::clone(&state.pool);
    let bg_key = key.clone();
    tokio::spawn(async move {
        let _ = pool.replenish(bg_key).await;
    });

    Ok(Json(BoardPayload::new(board)))
}

/// The dispatcher's take-or-generate loop.
///
/// A concurrent taker may win the race for a board generated inline, hence
/// the loop; an inline synthesis failure aborts the request instead.
async fn take_or_generate(state: &AppState, key: &PoolKey) -> Result<Board> {
    loop {
        let store = Arc::clone(&state.store);
        let take_key = key.clone();
        let taken =
            tokio::task::spawn_blocking(move || store.take_one(&take_key)).await??;
        if let Some(board) = taken {
            return Ok(board);
        }

        tracing::info!(%key, "backlog empty, generating inline");
        let store = Arc::clone(&state.store);
        let synth = Arc::clone(&state.synth);
        let gen_key = key.clone();
        tokio::task::spawn_blocking(move || generate_job(&store, synth.as_ref(), &gen_key))
            .await??;
    }
}

async fn solve_board(
    State(_state): State<AppState>,
    payload: core::result::Result<Json<SolvePayload>, JsonRejection>,
) -> Result<Json<SolvePayload>> {
    let Json(SolvePayload { board }) = payload.map_err(|rejection| {
        ServiceError::InvalidRequest {
            reason: rejection.body_text(),
        }
    })?;

    let outcome = tokio::task::spawn_blocking(move || {
        lantern::solve(&board).map(|solution| board.with_lights(&solution))
    })
    .await?;

    match outcome {
        Some(Ok(board)) => Ok(Json(SolvePayload { board })),
        // a solution naming a non-open cell would be an engine defect
        Some(Err(err)) => Err(ServiceError::Synthesis(err)),
        None => Err(ServiceError::Unsolvable),
    }
}

async fn backlog_status(State(state): State<AppState>) -> Result<Json<Vec<BacklogEntry>>> {
    let store = Arc::clone(&state.store);
    let counts = tokio::task::spawn_blocking(move || store.counts()).await??;
    let entries = counts
        .into_iter()
        .map(|(key, count)| BacklogEntry {
            width: key.width,
            height: key.height,
            difficulty: key.difficulty,
            count,
        })
        .collect();
    Ok(Json(entries))
}

fn parse_dim(name: &str, raw: Option<&str>, max: u32) -> Result<u32> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_DIM);
    };
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ServiceError::InvalidRequest {
            reason: format!("{name} must be a positive integer, got {raw:?}"),
        })?;
    if value == 0 || value > max {
        return Err(ServiceError::InvalidRequest {
            reason: format!("{name} must be between 1 and {max}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests;
