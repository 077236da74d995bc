//! Authorization gate
//!
//! The server consumes authentication only as a predicate: every API call is
//! gated on [`Authorizer::is_authorized`], and the identity is available for
//! audit logging. The user store and login flow themselves live outside this
//! service.

use axum::http::HeaderMap;

/// What the server knows about a caller
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    /// Bearer token presented by the caller, if any
    pub bearer_token: Option<String>,
}

impl CallerContext {
    /// Extract the caller context from the request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let bearer_token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        Self { bearer_token }
    }
}

/// Identity of an authorized caller, for audit and display only
#[derive(Debug, Clone)]
pub struct UserIdentity {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub username: String,
}

/// Authorization predicate gating every API operation
pub trait Authorizer: Send + Sync {
    /// Whether the caller may invoke operations.
    fn is_authorized(&self, ctx: &CallerContext) -> bool;

    /// The caller's identity, when authorized.
    fn current_user(&self, ctx: &CallerContext) -> Option<UserIdentity>;
}

/// Compares the caller's bearer token against a configured secret
pub struct TokenAuthorizer {
    token: String,
}

impl TokenAuthorizer {
    /// Create an authorizer accepting only the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authorizer for TokenAuthorizer {
    fn is_authorized(&self, ctx: &CallerContext) -> bool {
        ctx.bearer_token.as_deref() == Some(self.token.as_str())
    }

    fn current_user(&self, ctx: &CallerContext) -> Option<UserIdentity> {
        self.is_authorized(ctx).then(|| UserIdentity {
            id: "token".to_string(),
            username: "token".to_string(),
        })
    }
}

/// Accepts every caller. Used when no token is configured.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _ctx: &CallerContext) -> bool {
        true
    }

    fn current_user(&self, _ctx: &CallerContext) -> Option<UserIdentity> {
        Some(UserIdentity {
            id: "anonymous".to_string(),
            username: "anonymous".to_string(),
        })
    }
}
