use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::PayablesError;
use crate::store::BillStore;

/// The caller's tenant and user, resolved once per request.
///
/// Passed explicitly into every core operation; there is no ambient
/// "current company".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TenantContext {
    pub company_id: Uuid,
    pub user_id: Uuid,
}

impl TenantContext {
    pub fn new(company_id: Uuid, user_id: Uuid) -> Self {
        Self { company_id, user_id }
    }
}

/// Claims expected inside the JWT for authenticated users.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's UUID as a string.
    pub sub: String,
    /// The company (tenant) the user belongs to.
    pub company: String,
    pub exp: usize,
}

impl Claims {
    fn into_context(self) -> Option<TenantContext> {
        let user_id = Uuid::parse_str(&self.sub).ok()?;
        let company_id = Uuid::parse_str(&self.company).ok()?;
        Some(TenantContext::new(company_id, user_id))
    }
}

/// Decodes and validates an HS256 bearer token.
pub fn decode_token(token: &str, secret: &str) -> Result<TenantContext, PayablesError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let claims = decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256))
        .map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            PayablesError::Unauthorized
        })?
        .claims;

    claims.into_context().ok_or(PayablesError::Unauthorized)
}

/// Issues an HS256 token for `ctx`, valid for `ttl_seconds`.
pub fn issue_token(ctx: &TenantContext, secret: &str, ttl_seconds: i64) -> Result<String, PayablesError> {
    let exp = (chrono::Utc::now().timestamp() + ttl_seconds).max(0) as usize;
    let claims = Claims {
        sub: ctx.user_id.to_string(),
        company: ctx.company_id.to_string(),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| PayablesError::Config(format!("Failed to sign token: {}", e)))
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success the resolved [`TenantContext`] is stored in the request
/// extensions; on failure a `401` is returned.
pub async fn jwt_middleware<S: BillStore>(
    State(state): State<AppState<S>>,
    mut req: Request,
    next: Next,
) -> Result<Response, PayablesError> {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(PayablesError::Unauthorized)?;

    let ctx = decode_token(token, &state.jwt_secret)?;

    let span = tracing::Span::current();
    span.record("company_id", tracing::field::display(ctx.company_id));
    span.record("user_id", tracing::field::display(ctx.user_id));

    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
