use axum::{Json, Router, routing::get};

use crate::routes::OkResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

/// GET /api/health
async fn health() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{make_test_app, send};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_health_reports_ok() {
        let app = make_test_app();
        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }
}
