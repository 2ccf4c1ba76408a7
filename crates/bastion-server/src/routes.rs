//! HTTP handlers.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Form, Query, State};
use axum::http::{HeaderMap, header};
use bastion_auth::context::bearer_from_header;
use bastion_auth::{LoginInput, LogoutOutcome, RegisterInput, UpdateProfile};
use bastion_core::models::principal::Principal;
use bastion_core::models::session::Session;
use bastion_core::repository::Pagination;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{CurrentPrincipal, SuperUser};
use crate::state::AppState;

const MAX_PAGE_SIZE: u64 = 500;

// ---------------------------------------------------------------------------
// Public
// ---------------------------------------------------------------------------

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Bastion authentication service" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "message": format!("pong {}.", Utc::now().to_rfc3339()) }))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl From<RegisterRequest> for RegisterInput {
    fn from(req: RegisterRequest) -> Self {
        RegisterInput {
            username: req.username,
            email: req.email,
            password: req.password,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let out = state
        .auth
        .login(LoginInput {
            username: form.username,
            password: form.password,
            client_address: addr.ip().to_string(),
            client_agent: user_agent(&headers),
        })
        .await?;

    Ok(Json(TokenResponse {
        access_token: out.access_token,
        token_type: out.token_type,
        expires_in: out.expires_in,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Principal>, ApiError> {
    let principal = state.auth.register(req.into(), false).await?;
    Ok(Json(principal))
}

pub async fn register_superuser(
    State(state): State<AppState>,
    SuperUser(_admin): SuperUser,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Principal>, ApiError> {
    let principal = state.auth.register(req.into(), true).await?;
    Ok(Json(principal))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_from_header)
        .ok_or_else(|| ApiError::BadRequest("invalid token format".into()))?;

    let detail = match state.auth.logout(token).await? {
        LogoutOutcome::LoggedOut => "successfully logged out",
        LogoutOutcome::AlreadyInvalidated => "token not found or already invalidated",
    };
    Ok(Json(json!({ "detail": detail })))
}

pub async fn logout_all(
    State(state): State<AppState>,
    CurrentPrincipal(identity): CurrentPrincipal,
) -> Result<Json<Value>, ApiError> {
    let revoked = state.auth.logout_everywhere(identity.principal.id).await?;
    Ok(Json(json!({
        "detail": "all sessions revoked",
        "revoked": revoked,
    })))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMeRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    Pagination::default().limit
}

#[derive(Debug, Serialize)]
pub struct PrincipalPage {
    pub items: Vec<Principal>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// A session as shown to its owner. The token digest stays server-side.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub origin_address: String,
    pub client_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// True for the session the request was made with.
    pub current: bool,
}

impl SessionView {
    fn new(session: Session, current_id: Uuid) -> Self {
        Self {
            current: session.id == current_id,
            id: session.id,
            origin_address: session.origin_address,
            client_agent: session.client_agent,
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
        }
    }
}

pub async fn read_me(CurrentPrincipal(identity): CurrentPrincipal) -> Json<Principal> {
    Json(identity.principal)
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentPrincipal(identity): CurrentPrincipal,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<Principal>, ApiError> {
    let principal = state
        .auth
        .update_profile(
            identity.principal.id,
            UpdateProfile {
                username: req.username,
                email: req.email,
                password: req.password,
            },
        )
        .await?;
    Ok(Json(principal))
}

pub async fn my_sessions(
    State(state): State<AppState>,
    CurrentPrincipal(identity): CurrentPrincipal,
) -> Result<Json<Vec<SessionView>>, ApiError> {
    let sessions = state.auth.sessions(identity.principal.id).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionView::new(s, identity.session_id))
            .collect(),
    ))
}

pub async fn list_users(
    State(state): State<AppState>,
    SuperUser(_admin): SuperUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PrincipalPage>, ApiError> {
    let page = state
        .auth
        .list_principals(Pagination {
            offset: query.offset,
            limit: query.limit.min(MAX_PAGE_SIZE),
        })
        .await?;

    Ok(Json(PrincipalPage {
        items: page.items,
        total: page.total,
        offset: page.offset,
        limit: page.limit,
    }))
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
