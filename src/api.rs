// Inbound HTTP surface: /v1/product listing, detail and booking

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::booking::{BookingError, BookingWorkflow};
use crate::model::ProductPayload;
use crate::upstream::{ProductApi, UpstreamError};

pub struct AppState<C> {
    workflow: BookingWorkflow<C>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            workflow: self.workflow.clone(),
        }
    }
}

/// Build the full HTTP router around an upstream client.
pub fn router<C: ProductApi>(client: Arc<C>) -> Router {
    let state = AppState {
        workflow: BookingWorkflow::new(client),
    };

    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/product",
            get(list_products::<C>).post(book_empty_id::<C>),
        )
        .route(
            "/v1/product/",
            get(list_products::<C>).post(book_empty_id::<C>),
        )
        .route(
            "/v1/product/:id",
            get(get_product::<C>).post(book_inventory::<C>),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

async fn list_products<C: ProductApi>(State(state): State<AppState<C>>) -> Response {
    match state.workflow.list_products().await {
        Ok(payload) => payload_response(payload),
        Err(err) => booking_error_to_response(err),
    }
}

async fn get_product<C: ProductApi>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Response {
    match state.workflow.get_product(&id).await {
        Ok(payload) => payload_response(payload),
        Err(err) => booking_error_to_response(err),
    }
}

async fn book_inventory<C: ProductApi>(
    State(state): State<AppState<C>>,
    Path(inventory_id): Path<String>,
) -> Response {
    match state.workflow.book_by_inventory_id(&inventory_id).await {
        Ok(payload) => payload_response(payload),
        Err(err) => booking_error_to_response(err),
    }
}

// POST with no id segment books the empty identifier, which never validates.
async fn book_empty_id<C: ProductApi>(State(state): State<AppState<C>>) -> Response {
    match state.workflow.book_by_inventory_id("").await {
        Ok(payload) => payload_response(payload),
        Err(err) => booking_error_to_response(err),
    }
}

// Upstream bodies go out exactly as they came in.
fn payload_response(payload: ProductPayload) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        payload.into_bytes(),
    )
        .into_response()
}

pub fn booking_error_to_response(err: BookingError) -> Response {
    let status = match &err {
        BookingError::InvalidIdentifier | BookingError::AlreadyBooked => StatusCode::BAD_REQUEST,
        BookingError::UpstreamRead(cause) | BookingError::UpstreamWrite(cause) => match cause {
            UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            UpstreamError::CircuitBreakerOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        },
    };

    json_error(status, err.to_string())
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Unknown"),
            "message": message.into(),
        })),
    )
        .into_response()
}
