//! Request extractors that resolve the caller's identity.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, header};
use bastion_auth::context::bearer_from_header;
use bastion_auth::{AuthenticatedPrincipal, RequestContext, require_superuser};
use bastion_core::error::BastionError;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the authenticator's view of a request.
///
/// Returns `None` when the connection address is unknown, which only
/// happens if the router was not served with connect info.
pub fn request_context(headers: &HeaderMap, extensions: &Extensions) -> Option<RequestContext> {
    let ConnectInfo(addr) = extensions.get::<ConnectInfo<SocketAddr>>()?;

    let bearer_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_from_header)
        .map(str::to_owned);
    let client_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    Some(RequestContext {
        bearer_token,
        client_address: addr.ip().to_string(),
        client_agent,
    })
}

fn context_from_parts(parts: &Parts) -> Result<RequestContext, ApiError> {
    request_context(&parts.headers, &parts.extensions).ok_or_else(|| {
        ApiError::Domain(BastionError::Internal(
            "client address unavailable; serve with connect info".into(),
        ))
    })
}

/// Any authenticated, active principal.
pub struct CurrentPrincipal(pub AuthenticatedPrincipal);

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = context_from_parts(parts)?;
        let identity = state.auth.authenticate(&ctx).await?;
        Ok(Self(identity))
    }
}

/// An authenticated principal holding the superuser flag.
pub struct SuperUser(pub AuthenticatedPrincipal);

impl FromRequestParts<AppState> for SuperUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentPrincipal(identity) = CurrentPrincipal::from_request_parts(parts, state).await?;
        require_superuser(&identity)?;
        Ok(Self(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn context_uses_peer_ip_without_port() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.5"));
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 54321))));

        let ctx = request_context(&headers, &extensions).unwrap();
        assert_eq!(ctx.client_address, "192.0.2.1");
        assert_eq!(ctx.bearer_token.as_deref(), Some("abc"));
        assert_eq!(ctx.client_agent.as_deref(), Some("curl/8.5"));
    }

    #[test]
    fn context_requires_connect_info() {
        assert!(request_context(&HeaderMap::new(), &Extensions::new()).is_none());
    }
}
