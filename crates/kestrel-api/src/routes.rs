use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use kestrel_types::limits::{
    ADD_PREKEYS_BODY_LIMIT, FETCH_PREKEYS_BODY_LIMIT, LOGIN_BODY_LIMIT, RECV_BODY_LIMIT,
    REG_BODY_LIMIT, SEND_BODY_LIMIT, USER_INFO_BODY_LIMIT,
};

use crate::auth::{self, AppState};
use crate::middleware::require_bearer;
use crate::{messages, prekeys, users};

/// Every route the server exposes, each with its own request body cap.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route(
            "/api/reg",
            post(auth::register).layer(DefaultBodyLimit::max(REG_BODY_LIMIT)),
        )
        .route(
            "/api/login",
            post(auth::login).layer(DefaultBodyLimit::max(LOGIN_BODY_LIMIT)),
        )
        .route(
            "/api/fetchPrekeys",
            post(prekeys::fetch_prekeys).layer(DefaultBodyLimit::max(FETCH_PREKEYS_BODY_LIMIT)),
        )
        .route(
            "/api/userInfo",
            post(users::user_info).layer(DefaultBodyLimit::max(USER_INFO_BODY_LIMIT)),
        );

    let protected_routes = Router::new()
        .route(
            "/api/send",
            post(messages::send).layer(DefaultBodyLimit::max(SEND_BODY_LIMIT)),
        )
        .route(
            "/api/recv",
            post(messages::recv).layer(DefaultBodyLimit::max(RECV_BODY_LIMIT)),
        )
        .route(
            "/api/addPrekeys",
            post(prekeys::add_prekeys).layer(DefaultBodyLimit::max(ADD_PREKEYS_BODY_LIMIT)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health))
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use kestrel_accounts::{AccountService, ServiceConfig};
    use kestrel_crypto::CryptoError;
    use kestrel_crypto::passwd::PasswordHasher;
    use kestrel_store::config::ConfigFile;

    use super::*;
    use crate::auth::AppStateInner;

    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, passwd: &[u8], salt: &[u8]) -> Result<Vec<u8>, CryptoError> {
            Ok([salt, passwd].concat())
        }
    }

    async fn app(dir: &std::path::Path) -> Router {
        let mut file = ConfigFile::load_or_create(dir).await.unwrap();
        file.config.invitations = vec!["inv1".into(), "inv2".into()];
        file.save().await.unwrap();

        let settings = ServiceConfig {
            data_dir: dir.to_path_buf(),
            actor_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let accounts = AccountService::open(settings, Arc::new(PlainHasher)).await.unwrap();
        router(Arc::new(AppStateInner { accounts }))
    }

    async fn call(app: &Router, uri: &str, bearer: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(b) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {b}"));
        }
        let req = req.body(Body::from(body.to_string())).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    // "password" in unpadded url-safe base64
    const PASSWD: &str = "cGFzc3dvcmQ";

    async fn signup(app: &Router, inv: &str, name: &str) -> String {
        let (status, _) = call(
            app,
            "/api/reg",
            None,
            json!({"invitation": inv, "username": name, "passwd": PASSWD}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(
            app,
            "/api/login",
            None,
            json!({"username": name, "passwd": PASSWD, "sig_key": "s", "master_key": "m"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["need_prekeys"], true);
        body["bearer"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn send_and_recv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let alice = signup(&app, "inv1", "alice").await;
        let bob = signup(&app, "inv2", "bob").await;

        let (status, info) = call(&app, "/api/userInfo", None, json!({"username": "bob"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["sig_key"], "s");
        let bob_id = info["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "/api/send",
            Some(&alice),
            json!({"messages": [{"to": bob_id, "type": "text", "msg": "hi"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["need_prekeys"], true);

        let (status, body) = call(&app, "/api/recv", Some(&bob), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["type"], "text");
        assert_eq!(items[0]["msg"], "hi");
        assert!(items[0]["age_sec"].as_i64().unwrap() >= 0);

        let (_, body) = call(&app, "/api/recv", Some(&bob), json!({})).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn protected_routes_need_current_bearer() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let old = signup(&app, "inv1", "alice").await;
        let (_, body) = call(
            &app,
            "/api/login",
            None,
            json!({"username": "alice", "passwd": PASSWD, "sig_key": "s", "master_key": "m"}),
        )
        .await;
        let current = body["bearer"].as_str().unwrap().to_string();

        let (status, _) = call(&app, "/api/recv", None, json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "/api/recv", Some(&old), json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "/api/recv", Some("not.a-bearer"), json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "/api/recv", Some(&current), json!({})).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn error_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        signup(&app, "inv1", "alice").await;

        let (status, _) = call(
            &app,
            "/api/reg",
            None,
            json!({"invitation": "bogus", "username": "bob", "passwd": PASSWD}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            "/api/reg",
            None,
            json!({"invitation": "inv2", "username": "alice", "passwd": PASSWD}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(
            &app,
            "/api/login",
            None,
            json!({"username": "alice", "passwd": "d3Jvbmc", "sig_key": "s", "master_key": "m"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "/api/userInfo", None, json!({"username": "ghost"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn bad_message_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let alice = signup(&app, "inv1", "alice").await;
        let (status, _) = call(
            &app,
            "/api/send",
            Some(&alice),
            json!({"messages": [{"to": "x", "type": "text", "msg": "two words"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let huge = "a".repeat(REG_BODY_LIMIT * 2);
        let (status, _) = call(
            &app,
            "/api/reg",
            None,
            json!({"invitation": "inv1", "username": huge, "passwd": PASSWD}),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn prekeys_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let alice = signup(&app, "inv1", "alice").await;
        let (_, info) = call(&app, "/api/userInfo", None, json!({"username": "alice"})).await;
        let id = info["id"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            "/api/addPrekeys",
            Some(&alice),
            json!({"prekeys": ["k1", "k2"]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["live_prekeys"], json!(["k1", "k2"]));

        let (status, body) = call(
            &app,
            "/api/fetchPrekeys",
            None,
            json!({"ids": [id.clone(), "unknown", id]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prekeys"], json!(["k1", "", "k2"]));
    }
}
