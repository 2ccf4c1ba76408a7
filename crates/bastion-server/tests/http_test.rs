//! End-to-end tests driving the router with in-memory storage.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use bastion_auth::AuthConfig;
use bastion_auth::token::{self, TokenSubject};
use bastion_core::models::session::CreateSession;
use bastion_core::repository::SessionRepository;
use bastion_db::repository::SurrealSessionRepository;
use bastion_db::{DbConfig, DbManager};
use bastion_server::{AppState, router};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

const HOME: [u8; 4] = [203, 0, 113, 7];
const AWAY: [u8; 4] = [198, 51, 100, 23];

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "http-test-secret".into(),
        ..AuthConfig::default()
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    db: DbManager,
}

async fn spawn_app() -> TestApp {
    let db = DbManager::connect(&DbConfig::in_memory()).await.unwrap();
    bastion_db::run_migrations(db.client()).await.unwrap();
    let state = AppState::new(db.client().clone(), test_config()).unwrap();
    TestApp {
        router: router(state.clone(), Duration::from_secs(10)),
        state,
        db,
    }
}

impl TestApp {
    async fn send(&self, mut req: Request<Body>, ip: [u8; 4]) -> Response {
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        self.router.clone().oneshot(req).await.unwrap()
    }

    async fn register(&self, username: &str, password: &str) -> Response {
        let body = serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": password,
        });
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req, HOME).await
    }

    async fn login(&self, username: &str, password: &str, ip: [u8; 4]) -> Response {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::USER_AGENT, "http-test")
            .body(Body::from(format!("username={username}&password={password}")))
            .unwrap();
        self.send(req, ip).await
    }

    async fn token_for(&self, username: &str, password: &str, ip: [u8; 4]) -> String {
        let response = self.login(username, password, ip).await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn get(&self, uri: &str, token: Option<&str>, ip: [u8; 4]) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap(), ip).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, ip: [u8; 4]) -> Response {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap(), ip).await
    }

    /// Persist a session for a token that has only `ttl` left to live.
    async fn plant_token(&self, owner_username: &str, ttl: chrono::Duration) -> String {
        let principal = self
            .state
            .auth
            .list_principals(Default::default())
            .await
            .unwrap()
            .items
            .into_iter()
            .find(|p| p.username == owner_username)
            .unwrap();

        let origin = std::net::Ipv4Addr::from(HOME).to_string();
        let issued = self
            .state
            .auth
            .codec()
            .issue(
                &TokenSubject {
                    owner_id: principal.id,
                    email: &principal.email,
                    username: &principal.username,
                    origin: &origin,
                },
                ttl,
            )
            .unwrap();

        SurrealSessionRepository::new(self.db.client().clone())
            .put(CreateSession {
                owner_id: principal.id,
                token_hash: token::hash_token(&issued.token),
                origin_address: origin,
                client_agent: None,
                expires_at: issued.expires_at,
                issued_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        issued.token
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn public_endpoints_respond() {
    let app = spawn_app().await;
    for uri in ["/", "/health", "/ping"] {
        let response = app.get(uri, None, HOME).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn alice_is_bound_to_her_address() {
    let app = spawn_app().await;

    let response = app.register("alice", "s3cret!").await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = json_body(response).await;
    assert_eq!(profile["username"], "alice");
    assert!(profile.get("password_hash").is_none());

    let response = app.login("alice", "s3cret%21", HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 1800);
    let t1 = body["access_token"].as_str().unwrap().to_string();

    let response = app.get("/api/v1/users/me", Some(&t1), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-new-token").is_none());
    let me = json_body(response).await;
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");

    let response = app.get("/api/v1/users/me", Some(&t1), AWAY).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    assert_eq!(
        json_body(response).await["detail"],
        "could not validate credentials"
    );
}

#[tokio::test]
async fn bad_password_is_unauthorized() {
    let app = spawn_app().await;
    app.register("alice", "s3cret!").await;

    let response = app.login("alice", "nope", HOME).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = spawn_app().await;
    let response = app.get("/api/v1/users/me", None, HOME).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let app = spawn_app().await;
    assert_eq!(app.register("alice", "pw").await.status(), StatusCode::OK);
    assert_eq!(app.register("alice", "pw").await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn near_expiry_token_comes_back_replaced() {
    let app = spawn_app().await;
    app.register("alice", "s3cret!").await;
    let old = app.plant_token("alice", chrono::Duration::minutes(2)).await;

    let response = app.get("/api/v1/users/me", Some(&old), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    let new = response
        .headers()
        .get("x-new-token")
        .expect("replacement header")
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(new, old);
    assert_eq!(json_body(response).await["username"], "alice");

    assert_eq!(
        app.get("/api/v1/users/me", Some(&new), HOME).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        app.get("/api/v1/users/me", Some(&old), HOME).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn failed_request_is_never_refreshed() {
    let app = spawn_app().await;
    app.register("alice", "s3cret!").await;
    let old = app.plant_token("alice", chrono::Duration::minutes(2)).await;

    let response = app.get("/api/v1/users/me", Some(&old), AWAY).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("x-new-token").is_none());

    // Still usable from home.
    assert_eq!(
        app.get("/api/v1/users/me", Some(&old), HOME).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn logout_flow() {
    let app = spawn_app().await;
    app.register("alice", "s3cret!").await;
    let token = app.token_for("alice", "s3cret%21", HOME).await;

    let response = app.post("/api/v1/auth/logout", None, HOME).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post("/api/v1/auth/logout", Some(&token), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["detail"], "successfully logged out");

    let response = app.get("/api/v1/users/me", Some(&token), HOME).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.post("/api/v1/auth/logout", Some(&token), HOME).await;
    assert_eq!(
        json_body(response).await["detail"],
        "token not found or already invalidated"
    );
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let app = spawn_app().await;
    app.register("alice", "s3cret!").await;
    let home = app.token_for("alice", "s3cret%21", HOME).await;
    let away = app.token_for("alice", "s3cret%21", AWAY).await;

    let response = app.get("/api/v1/users/me/sessions", Some(&home), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    let sessions = json_body(response).await;
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(
        sessions.iter().filter(|s| s["current"] == true).count(),
        1
    );
    assert!(sessions.iter().all(|s| s.get("token_hash").is_none()));

    let response = app.post("/api/v1/auth/logout-all", Some(&home), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["revoked"], 2);

    assert_eq!(
        app.get("/api/v1/users/me", Some(&away), AWAY).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn user_listing_requires_superuser() {
    let app = spawn_app().await;
    app.register("alice", "s3cret!").await;
    let token = app.token_for("alice", "s3cret%21", HOME).await;

    let response = app.get("/api/v1/users", Some(&token), HOME).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
