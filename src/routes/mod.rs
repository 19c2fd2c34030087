use crate::models::AppState;
use axum::Router;
use tower_http::services::ServeDir;

pub mod auth_routes;
pub mod spa_appointment_routes;
pub mod spa_service_routes;
pub mod time_slot_routes;
pub mod upload_routes;

pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.uploads.dir);

    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", time_slot_routes::router())
        .nest("/api/v1", spa_service_routes::router())
        .nest("/api/v1", spa_appointment_routes::router())
        .nest("/api/v1", upload_routes::router(&state.uploads))
        .nest_service("/uploads", uploads)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::UploadSettings;

    /// The pool never connects; every request below is answered before any
    /// query would run.
    fn test_state(upload_dir: &std::path::Path) -> AppState {
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/petspa_test")
            .unwrap();
        AppState {
            db,
            session_ttl_hours: 24,
            uploads: Arc::new(UploadSettings {
                dir: upload_dir.to_path_buf(),
                ..UploadSettings::default()
            }),
        }
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn admin_routes_require_bearer_token() {
        let tmp = tempfile::tempdir().unwrap();

        for (method, uri) in [
            ("GET", "/api/v1/spa-appointments/admin"),
            ("GET", "/api/v1/spa-time-slots/availability?date=2025-05-01"),
            ("POST", "/api/v1/spa-services"),
            ("PUT", "/api/v1/spa-appointments/00000000-0000-0000-0000-000000000000/restore"),
            ("POST", "/api/v1/upload/single"),
            ("GET", "/api/v1/auth/me"),
        ] {
            let app = router(test_state(tmp.path()));
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = app.oneshot(req).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(error_code(response).await, "SESSION_EXPIRED");
        }
    }

    #[tokio::test]
    async fn login_rejects_blank_credentials() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_state(tmp.path()));

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"username":"  ","password":""}"#))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn serves_uploaded_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("cat.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let app = router(test_state(tmp.path()));
        let req = Request::builder()
            .uri("/uploads/cat.png")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], &[0x89, b'P', b'N', b'G']);

        let app = router(test_state(tmp.path()));
        let req = Request::builder()
            .uri("/uploads/missing.png")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
