use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::cors::CorsPolicy;
use crate::service::FormulaRequestService;

#[derive(Clone)]
struct AppState {
    service: Arc<FormulaRequestService>,
    cors: Arc<CorsPolicy>,
}

/// Routes every method on `endpoint_path` to the formula service.
pub fn router(service: Arc<FormulaRequestService>, cors: CorsPolicy, endpoint_path: &str) -> Router {
    Router::new()
        .route(endpoint_path, any(formula_endpoint))
        .with_state(AppState {
            service,
            cors: Arc::new(cors),
        })
}

#[instrument(skip_all, fields(method = %method))]
async fn formula_endpoint(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    let reply = state.service.handle(&method, &body).await;
    let mut response = match reply.body {
        Some(body) => (reply.status, Json(body)).into_response(),
        None => reply.status.into_response(),
    };
    state.cors.apply(response.headers_mut());
    info!(status = %reply.status, "Formula request answered");
    response
}

/// Serves `router` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Server is running on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
