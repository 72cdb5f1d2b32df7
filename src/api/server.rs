//! Router, shared state and error rendering.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::api::handler::{query_clips, status};
use crate::error::{AppError, Result};
use crate::pipeline::Crawler;
use crate::storage::SnapshotKeeper;
use crate::store::ClipStore;

pub type JsonResult<T> = core::result::Result<Json<T>, ApiError>;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ClipStore>,
    pub crawler: Option<Arc<Crawler>>,
    pub keeper: Option<Arc<SnapshotKeeper>>,
}

impl AppState {
    pub fn new(store: Arc<ClipStore>) -> Self {
        Self {
            store,
            crawler: None,
            keeper: None,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/clips", get(query_clips))
        .route("/api/v1/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(log_route_errors))
        .with_state(state)
}

/// Serve the API on `bind` until `cancel` fires.
pub async fn serve(bind: &str, state: Arc<AppState>, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn log_route_errors(request: Request, next: Next) -> Response {
    let uri = request.uri().to_string();
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<ApiError>>() {
        if res.status().is_server_error() {
            log::error!("{} failed: {}", uri, err);
        } else {
            log::debug!("{} rejected: {}", uri, err);
        }
    }
    res
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let status = match &self {
            ApiError::App(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::App(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            ApiError::App(AppError::InvalidQuery(message)) => message.clone(),
            ApiError::App(err) => err.to_string(),
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();
        response.extensions_mut().insert(Arc::new(self));
        response
    }
}
