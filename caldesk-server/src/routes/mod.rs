pub mod events;
pub mod health;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use caldesk_core::ScheduleError;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::wire::FieldDoc;

/// Every route, with CORS and request tracing applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(events::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Body of responses that only acknowledge
#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDoc>,
}

/// Convert anyhow errors to HTTP responses
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, fields) = match self.0.downcast_ref::<ScheduleError>() {
            Some(ScheduleError::Validation(v)) => (
                StatusCode::BAD_REQUEST,
                v.failures().iter().map(FieldDoc::from).collect(),
            ),
            Some(ScheduleError::InvalidArgument(_)) => (StatusCode::BAD_REQUEST, Vec::new()),
            Some(ScheduleError::NotFound(_)) => (StatusCode::NOT_FOUND, Vec::new()),
            Some(ScheduleError::Storage(_)) | None => {
                tracing::error!("request failed: {:#}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
            }
        };

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            fields,
        });
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use caldesk_core::{MemoryStorage, SchedulerConfig};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::AppState;

    pub fn make_test_app() -> Router {
        let state = AppState::new(Arc::new(MemoryStorage::new()), SchedulerConfig::default());
        super::app(state)
    }

    /// Send one request and return the status with the parsed JSON body.
    pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
