use crate::{
    auth::jwt::verify_token,
    config::Config,
    error::ApiError,
    model::role::Role,
    models::{Claims, TokenType},
};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    /// Human-facing employee id, e.g. EMP-2026-0007
    pub employee_id: String,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        if claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_self_or_admin(&self, user_id: u64) -> Result<(), ApiError> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Not allowed to access another employee".into()))
        }
    }

    /// Resolves an optional `user_id` filter: admins may look at anyone and
    /// default to themselves, employees only ever see their own data.
    pub fn target_user(&self, requested: Option<u64>) -> Result<u64, ApiError> {
        match requested {
            Some(user_id) => {
                self.require_self_or_admin(user_id)?;
                Ok(user_id)
            }
            None => Ok(self.user_id),
        }
    }
}

/// `Authorization: Bearer <token>`
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Bearer header first, then the `access_token` cookie set at login
pub fn access_token(req: &HttpRequest) -> Option<String> {
    bearer_token(req).or_else(|| req.cookie(ACCESS_COOKIE).map(|c| c.value().to_string()))
}

pub fn authenticate_token(token: &str, config: &Config) -> Result<AuthUser, ApiError> {
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
    AuthUser::from_claims(claims)
}

pub fn authenticate(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| ApiError::Internal("App config missing".into()))?;

    let token =
        access_token(req).ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;

    authenticate_token(&token, config)
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // the middleware already decoded the token for protected routes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        ready(authenticate(req).map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, user_id: u64) -> AuthUser {
        AuthUser {
            user_id,
            email: "someone@company.com".into(),
            role,
            employee_id: "EMP-2026-0001".into(),
        }
    }

    #[test]
    fn admin_guard() {
        assert!(user(Role::Admin, 1).require_admin().is_ok());
        assert!(matches!(
            user(Role::Employee, 2).require_admin(),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn employees_are_confined_to_themselves() {
        let emp = user(Role::Employee, 5);
        assert_eq!(emp.target_user(None).unwrap(), 5);
        assert_eq!(emp.target_user(Some(5)).unwrap(), 5);
        assert!(emp.target_user(Some(6)).is_err());
    }

    #[test]
    fn admins_can_target_anyone() {
        let admin = user(Role::Admin, 1);
        assert_eq!(admin.target_user(Some(6)).unwrap(), 6);
        assert_eq!(admin.target_user(None).unwrap(), 1);
    }

    #[test]
    fn refresh_claims_cannot_authenticate_requests() {
        let claims = Claims {
            user_id: 1,
            sub: "a@b.c".into(),
            role: 1,
            exp: usize::MAX,
            jti: "j".into(),
            token_type: TokenType::Refresh,
            employee_id: "EMP-2026-0001".into(),
        };
        assert!(matches!(
            AuthUser::from_claims(claims),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
