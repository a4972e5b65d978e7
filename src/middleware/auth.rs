use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, models::Role};

/// Authenticated principal decoded from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
}

/// Capability predicate evaluated at the call site of each operation.
/// Composes the owner/role checks that guard bookings, orders and reviews.
#[derive(Debug, Clone, Copy)]
pub enum Access<'a> {
    /// Caller must hold one of the listed roles.
    AnyRole(&'a [Role]),
    /// Caller must be the owner of the resource or hold one of the roles.
    OwnerOr(Uuid, &'a [Role]),
}

impl Access<'_> {
    pub fn check(&self, user: &AuthUser) -> Result<(), AppError> {
        let allowed = match self {
            Access::AnyRole(roles) => roles.contains(&user.role),
            Access::OwnerOr(owner, roles) => *owner == user.user_id || roles.contains(&user.role),
        };
        if allowed { Ok(()) } else { Err(AppError::Forbidden) }
    }
}

pub const STAFF: &[Role] = &[Role::Admin, Role::Manager, Role::Waiter];
pub const MANAGERS: &[Role] = &[Role::Admin, Role::Manager];

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::BadRequest("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

        let role = Role::from_str(&decoded.claims.role)
            .ok_or_else(|| AppError::BadRequest("Unknown role in token".into()))?;

        Ok(AuthUser {
            user_id,
            role,
            email: decoded.claims.email.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            email: "user@example.com".into(),
        }
    }

    #[test]
    fn role_policy_rejects_customers() {
        let waiter = principal(Role::Waiter);
        let customer = principal(Role::Customer);
        assert!(Access::AnyRole(STAFF).check(&waiter).is_ok());
        assert!(Access::AnyRole(STAFF).check(&customer).is_err());
        assert!(Access::AnyRole(MANAGERS).check(&waiter).is_err());
    }

    #[test]
    fn owner_policy_admits_owner_and_staff() {
        let owner = principal(Role::Customer);
        let other = principal(Role::Customer);
        let manager = principal(Role::Manager);
        let policy = Access::OwnerOr(owner.user_id, STAFF);
        assert!(policy.check(&owner).is_ok());
        assert!(policy.check(&manager).is_ok());
        assert!(policy.check(&other).is_err());
    }
}
