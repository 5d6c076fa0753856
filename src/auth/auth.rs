use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use serde::Serialize;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub user_id: u64,
    #[schema(example = "2024-0012")]
    pub employee_number: String,
    #[schema(value_type = String, example = "staff")]
    pub role: Role,
}

impl AuthUser {
    /// Validates an access token's claims into a caller identity.
    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        if claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }
        let role = Role::from_str(&claims.role)
            .map_err(|_| ApiError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            employee_number: claims.sub,
            role,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ApiError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ApiError::Internal("Config missing".into()))),
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ApiError::Unauthorized("Invalid token".into()))),
        };

        ready(AuthUser::from_claims(claims))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator only"))
        }
    }

    /// Staff may only touch their own records.
    pub fn require_self_or_admin(&self, employee_number: &str) -> Result<(), ApiError> {
        if self.role.is_admin() || self.employee_number == employee_number {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not allowed to access another employee's records"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str, token_type: TokenType) -> Claims {
        Claims {
            user_id: 3,
            sub: "2024-0001".into(),
            role: role.into(),
            exp: usize::MAX,
            jti: "j".into(),
            token_type,
        }
    }

    #[test]
    fn refresh_tokens_are_not_identities() {
        assert!(AuthUser::from_claims(claims("staff", TokenType::Refresh)).is_err());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(AuthUser::from_claims(claims("owner", TokenType::Access)).is_err());
    }

    #[test]
    fn staff_limited_to_self() {
        let user = AuthUser::from_claims(claims("staff", TokenType::Access)).unwrap();
        assert!(user.require_self_or_admin("2024-0001").is_ok());
        assert!(user.require_self_or_admin("2024-0002").is_err());
        assert!(user.require_admin().is_err());
    }

    #[test]
    fn both_admin_roles_pass_the_admin_guard() {
        for role in ["administrator", "superadmin"] {
            let user = AuthUser::from_claims(claims(role, TokenType::Access)).unwrap();
            assert!(user.require_admin().is_ok());
            assert!(user.require_self_or_admin("anyone").is_ok());
        }
    }
}
