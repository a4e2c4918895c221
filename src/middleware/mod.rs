//! Cross-cutting HTTP behavior: CORS, fallbacks and panic recovery.

use std::any::Any;

use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use crate::errors::ErrorResponse;

/// Maximum accepted request body size.
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

const ROUTE_NOT_FOUND: &str = "Rota não encontrada";
const INTERNAL_ERROR: &str = "Erro interno do servidor";
const GENERIC_DETAIL: &str = "Algo deu errado";

/// Permissive cross-origin headers for every response.
///
/// Every `OPTIONS` request is answered here with 200, preflight or not.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Fallback for unknown routes and unsupported methods.
pub async fn route_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::message(ROUTE_NOT_FOUND)),
    )
        .into_response()
}

/// Build the response sent when a handler panics.
///
/// The panic payload is only echoed back in development.
pub fn panic_responder(
    expose_details: bool,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone + Send + Sync + 'static {
    move |panic: Box<dyn Any + Send + 'static>| {
        let detail = if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic".to_string()
        };
        tracing::error!(detail = %detail, "handler panicked");

        let body = ErrorResponse {
            error: Some(if expose_details {
                detail
            } else {
                GENERIC_DETAIL.to_string()
            }),
            ..ErrorResponse::message(INTERNAL_ERROR)
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
