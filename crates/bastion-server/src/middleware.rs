//! Transparent token refresh around every protected request.

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::extract::request_context;
use crate::state::AppState;

/// Run the request, then attach a replacement token header if the
/// bearer token was close to expiry and the response succeeded.
///
/// The response body is never touched and refresh failures never
/// change the response.
pub async fn auto_refresh(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ctx = request_context(req.headers(), req.extensions())
        .filter(|ctx| state.refresher.applies_to(req.uri().path(), ctx));

    let mut response = next.run(req).await;

    let Some(ctx) = ctx else {
        return response;
    };
    if response.status().as_u16() >= 400 {
        return response;
    }

    if let Some(token) = state.refresher.maybe_refresh(&ctx).await {
        match HeaderValue::from_str(&token) {
            Ok(value) => {
                response
                    .headers_mut()
                    .insert(state.refresh_header.clone(), value);
            }
            Err(e) => debug!(error = %e, "Replacement token is not a valid header value"),
        }
    }

    response
}
