use axum::{extract::Request, middleware::Next, response::Response};

use crate::{
    error::{AppError, Result},
    middleware::auth::AuthUser,
};

/// Gate for operator-only routes. The role claim is authoritative: the auth
/// service owns role assignment and revocation, so no user lookup is needed
/// here.
pub async fn admin_authorization(
    AuthUser(user): AuthUser,
    request: Request,
    next: Next,
) -> Result<Response> {
    if !user.is_operator() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}
