use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;

use crate::error::AppError;
use crate::pipeline::Stage;
use crate::sanitizer::sanitize_json;
use crate::state::AppState;

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// 413 when the body ran into `limit`; any other read failure, such as a
/// client that went away mid-upload, is a 400.
fn buffering_error(err: axum::Error, limit: usize) -> AppError {
    let inner = err.into_inner();
    let root: &(dyn std::error::Error + 'static) = &*inner;
    if std::iter::successors(Some(root), |e| e.source()).any(|e| e.is::<LengthLimitError>()) {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::BadRequest("Request body could not be read".to_string())
    }
}

/// XSS sanitization stage.
///
/// Buffers JSON request bodies and runs every string value through the
/// configured sanitizer before the handler sees it. Other content types and
/// bodies that are not valid JSON pass through untouched; the handler's own
/// extractor reports malformed JSON.
pub async fn xss_sanitize_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_json(req.headers()) {
        return next.run(req).await;
    }

    let stage = Stage::Sanitization.as_str();
    let limit = state.config.server.max_body_bytes;
    let (mut parts, body) = req.into_parts();
    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(stage, error = %e, limit, "failed to buffer request body");
            return buffering_error(e, limit).into_response();
        }
    };

    let bytes = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut value) => {
            let report = sanitize_json(&mut value, state.sanitizer.as_ref());
            state.metrics.add_fields_sanitized(report.modified as u64);
            state.metrics.add_sanitizer_failures(report.cleared as u64);
            if report.changed() {
                tracing::debug!(stage, modified = report.modified, cleared = report.cleared, path = %parts.uri.path(), "request body sanitized");
                match serde_json::to_vec(&value) {
                    Ok(encoded) => Bytes::from(encoded),
                    Err(e) => {
                        tracing::warn!(stage, error = %e, "re-encoding sanitized body failed");
                        return AppError::Internal(e.into()).into_response();
                    }
                }
            } else {
                bytes
            }
        }
        Err(_) => bytes,
    };

    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
