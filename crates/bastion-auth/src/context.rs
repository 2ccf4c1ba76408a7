//! Per-request input to the authenticator and refresh interceptor.

/// What the transport layer observed about one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Raw token from `Authorization: Bearer <token>`, if any.
    pub bearer_token: Option<String>,
    /// Observed client network address (IP only, no port).
    pub client_address: String,
    pub client_agent: Option<String>,
}

impl RequestContext {
    pub fn new(client_address: impl Into<String>) -> Self {
        Self {
            client_address: client_address.into(),
            ..Self::default()
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.client_agent = Some(agent.into());
        self
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively. Returns `None` for any
/// other scheme or an empty token.
pub fn bearer_from_header(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_from_header("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_from_header("bearer   tok "), Some("tok"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(bearer_from_header("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_from_header("Bearer "), None);
        assert_eq!(bearer_from_header("tokenwithoutscheme"), None);
    }

    #[test]
    fn builder_sets_fields() {
        let ctx = RequestContext::new("10.0.0.1")
            .with_bearer("t")
            .with_agent("curl/8");
        assert_eq!(ctx.client_address, "10.0.0.1");
        assert_eq!(ctx.bearer_token.as_deref(), Some("t"));
        assert_eq!(ctx.client_agent.as_deref(), Some("curl/8"));
    }
}
