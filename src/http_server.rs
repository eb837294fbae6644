//! HTTP JSON API for the NLU service
//!
//! Every endpoint is a stateless transformation of `{"text": ...}`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::service::NluService;

const SERVICE_NAME: &str = "airline-nlu";

/// Inbound request body
#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message, details) = if self.is_client_error() {
            (StatusCode::BAD_REQUEST, "Malformed request", self.to_string())
        } else {
            error!("request failed: {}", self);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                "the request could not be processed".to_string(),
            )
        };

        let body = json!({
            "success": false,
            "error": message,
            "details": details,
        });

        (status, Json(body)).into_response()
    }
}

/// Builds the router with CORS and request tracing
pub fn router(service: NluService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/entities", post(entities))
        .route("/intent", post(intent))
        .route("/extract-route", post(extract_route))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Listens on `addr` until Ctrl-C
pub async fn serve(service: NluService, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(service);

    let listener = TcpListener::bind(addr).await?;
    info!("Starting NLU HTTP server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("NLU HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn request_text(payload: Result<Json<TextRequest>, JsonRejection>) -> Result<Option<String>, Error> {
    match payload {
        Ok(Json(request)) => Ok(request.text),
        Err(rejection) => Err(Error::MalformedRequest(rejection.body_text())),
    }
}

async fn health(State(service): State<NluService>) -> Json<Value> {
    let annotator = service.annotator();
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "annotator": if annotator.is_present() { "present" } else { "absent" },
    }))
}

async fn process(
    State(service): State<NluService>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let text = request_text(payload)?;
    let interpretation = service.process(text.as_deref()).await?;
    Ok(Json(json!({ "success": true, "result": interpretation })))
}

async fn entities(
    State(service): State<NluService>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let text = request_text(payload)?;
    let entities = service.entities(text.as_deref()).await?;
    Ok(Json(json!({ "success": true, "entities": entities })))
}

async fn intent(
    State(service): State<NluService>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let text = request_text(payload)?;
    let intent = service.intent(text.as_deref())?;
    Ok(Json(json!({ "success": true, "intent": intent })))
}

async fn extract_route(
    State(service): State<NluService>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let text = request_text(payload)?;
    let route = service.route(text.as_deref()).await?;
    Ok(Json(json!({ "success": true, "route": route })))
}
