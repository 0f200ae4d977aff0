pub mod auth;
pub mod captures;
pub mod middleware;
pub mod photos;
pub mod state;
pub mod stats;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_mw,
    routing::{get, patch, post, put},
};

pub use state::{AppState, AppStateInner};

/// GET /health: liveness check (no auth).
pub async fn health() -> &'static str {
    "ok"
}

/// Build the HTTP API. Transport layers (tracing, CORS) are added by the
/// server binary.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/captures", get(captures::list_captures).post(captures::create_capture))
        .route("/captures/stats", get(stats::capture_stats))
        .route(
            "/captures/{id}",
            get(captures::get_capture).delete(captures::delete_capture),
        )
        .route("/captures/{id}/status", patch(captures::update_status))
        .route(
            "/storage/photos/{name}",
            put(photos::upload_photo).delete(photos::delete_photo),
        )
        .route_layer(axum_mw::from_fn_with_state(state.clone(), middleware::require_auth));

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/storage/photos/{name}", get(photos::download_photo))
        .route("/health", get(health));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(photos::MAX_PHOTO_SIZE))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use fieldlog_db::Database;
    use fieldlog_storage::Storage;

    async fn app() -> Router {
        let dir = std::env::temp_dir().join(format!("fieldlog-api-{}", uuid::Uuid::new_v4()));
        let state = Arc::new(AppStateInner::new(
            Database::open_in_memory().unwrap(),
            Storage::new(dir).await.unwrap(),
            "test-secret".into(),
            "http://field.test/",
        ));
        router(state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn send_json(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = send(app, req).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> (String, String) {
        let (status, body) = send_json(
            app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": email, "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    fn site_a() -> Value {
        json!({
            "title": "Site A",
            "data": {
                "location": "Lake X",
                "date": "2026-10-19",
                "time": "09:30",
                "temperature": "14.5",
                "waterQuality": "good",
                "photoUrls": []
            }
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app().await;
        let (status, body) =
            send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let app = app().await;
        let (token, id) = register(&app, "Observer@Example.com").await;

        let (status, me) = send_json(&app, "GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], id);
        assert_eq!(me["email"], "observer@example.com");
        assert_eq!(me["display_name"], "observer");

        let (status, body) = send_json(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "observer@example.com", "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id);

        let (status, _) = send_json(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "observer@example.com", "password": "wrong password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let app = app().await;
        register(&app, "a@example.com").await;

        for (email, password, expected) in [
            ("not-an-email", "long enough", StatusCode::BAD_REQUEST),
            ("b@example.com", "short", StatusCode::BAD_REQUEST),
            ("A@example.com", "long enough", StatusCode::CONFLICT),
        ] {
            let (status, _) = send_json(
                &app,
                "POST",
                "/auth/register",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
            assert_eq!(status, expected, "{email}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_of_one_email_yield_one_account() {
        let app = app().await;

        for round in 0..5 {
            let email = format!("race{round}@example.com");
            let body = || Some(json!({ "email": email, "password": "correct horse" }));
            let (first, second) = tokio::join!(
                send_json(&app, "POST", "/auth/register", None, body()),
                send_json(&app, "POST", "/auth/register", None, body()),
            );
            let mut statuses = [first.0.as_u16(), second.0.as_u16()];
            statuses.sort_unstable();
            assert_eq!(statuses, [201, 409], "{email}");
        }

        let (status, _) = send_json(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "race0@example.com", "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let app = app().await;
        let (status, _) = send_json(&app, "GET", "/captures", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send_json(&app, "GET", "/captures", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn capture_lifecycle() {
        let app = app().await;
        let (token, user_id) = register(&app, "observer@example.com").await;

        let (status, created) =
            send_json(&app, "POST", "/captures", Some(&token), Some(site_a())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "draft");
        assert_eq!(created["user_id"], user_id);
        assert_eq!(created["data"]["location"], "Lake X");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, list) = send_json(
            &app,
            "GET",
            &format!("/captures?user_id={user_id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, updated) = send_json(
            &app,
            "PATCH",
            &format!("/captures/{id}/status"),
            Some(&token),
            Some(json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "approved");

        let (status, _) =
            send_json(&app, "DELETE", &format!("/captures/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            send_json(&app, "GET", &format!("/captures/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let app = app().await;
        let (token, _) = register(&app, "observer@example.com").await;
        let (status, _) = send_json(
            &app,
            "POST",
            "/captures",
            Some(&token),
            Some(json!({ "title": "   ", "data": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn captures_are_isolated_between_users() {
        let app = app().await;
        let (alice, alice_id) = register(&app, "alice@example.com").await;
        let (bob, _) = register(&app, "bob@example.com").await;

        let (_, created) = send_json(&app, "POST", "/captures", Some(&alice), Some(site_a())).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send_json(
            &app,
            "GET",
            &format!("/captures?user_id={alice_id}"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, list) = send_json(&app, "GET", "/captures", Some(&bob), None).await;
        assert!(list.as_array().unwrap().is_empty());

        let (status, _) =
            send_json(&app, "GET", &format!("/captures/{id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) =
            send_json(&app, "DELETE", &format!("/captures/{id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats_for_window() {
        let app = app().await;
        let (token, _) = register(&app, "observer@example.com").await;
        send_json(&app, "POST", "/captures", Some(&token), Some(site_a())).await;

        let (status, stats) =
            send_json(&app, "GET", "/captures/stats?days=7", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["window"], 7);
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["top_locations"][0]["location"], "Lake X");

        let (status, stats) = send_json(&app, "GET", "/captures/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["window"], 30);

        let (status, _) =
            send_json(&app, "GET", "/captures/stats?days=14", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    fn put_photo(name: &str, token: &str, bytes: impl Into<Vec<u8>>) -> Request<Body> {
        Request::put(format!("/storage/photos/{name}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "image/jpeg")
            .body(Body::from(bytes.into()))
            .unwrap()
    }

    #[tokio::test]
    async fn photo_upload_download_delete() {
        let app = app().await;
        let (alice, _) = register(&app, "alice@example.com").await;
        let (bob, _) = register(&app, "bob@example.com").await;
        let name = "1760860000000-0a1b2c3d-lake.jpg";

        let (status, body) = send(&app, put_photo(name, &alice, b"jpeg bytes")).await;
        assert_eq!(status, StatusCode::CREATED);
        let uploaded: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(uploaded["url"], format!("http://field.test/storage/photos/{name}"));
        assert_eq!(uploaded["size"], 10);

        let (status, _) = send(&app, put_photo(name, &alice, b"other bytes")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let resp = app
            .clone()
            .oneshot(Request::get(format!("/storage/photos/{name}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"jpeg bytes");

        let (status, _) =
            send_json(&app, "DELETE", &format!("/storage/photos/{name}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            send_json(&app, "DELETE", &format!("/storage/photos/{name}"), Some(&alice), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) =
            send(&app, Request::get(format!("/storage/photos/{name}")).body(Body::empty()).unwrap())
                .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn photo_upload_rejects_bad_names_and_empty_bodies() {
        let app = app().await;
        let (token, _) = register(&app, "observer@example.com").await;

        let (status, _) = send(&app, put_photo(".hidden", &token, b"x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, put_photo("empty.jpg", &token, b"")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Request::put("/storage/photos/anon.jpg").body(Body::from("x")).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn photo_upload_size_limit_is_inclusive() {
        let app = app().await;
        let (token, _) = register(&app, "observer@example.com").await;

        let (status, _) = send(
            &app,
            put_photo("too-big.jpg", &token, vec![0u8; photos::MAX_PHOTO_SIZE + 1]),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let (status, _) = send_json(&app, "GET", "/storage/photos/too-big.jpg", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, put_photo("at-limit.jpg", &token, vec![0u8; photos::MAX_PHOTO_SIZE])).await;
        assert_eq!(status, StatusCode::CREATED);
        let uploaded: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(uploaded["size"], photos::MAX_PHOTO_SIZE);
    }
}
