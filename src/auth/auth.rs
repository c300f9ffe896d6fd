use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::{model::role::Role, models::Claims};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// The authenticated principal of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        let role = Role::from_id(claims.role)
            .ok_or_else(|| ApiError::Unauthorized("Invalid role".to_string()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            name: claims.name,
            role,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Normally set by the auth middleware.
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
            None => return ready(Err(ApiError::Unauthorized("Missing token".to_string()).into())),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ApiError::Internal("Config missing".to_string()).into())),
        };

        let result = verify_token(token, &config.jwt_secret)
            .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))
            .and_then(AuthUser::from_claims)
            .map_err(actix_web::Error::from);

        ready(result)
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_teacher(&self) -> Result<(), ApiError> {
        if self.role == Role::Teacher {
            Ok(())
        } else {
            Err(ApiError::forbidden("Teacher only"))
        }
    }

    pub fn require_teacher_or_admin(&self) -> Result<(), ApiError> {
        if matches!(self.role, Role::Teacher | Role::Admin) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Teacher/Admin only"))
        }
    }

    /// Admins may act on any classroom, teachers only on their own.
    pub fn require_classroom_owner(&self, teacher_id: u64) -> Result<(), ApiError> {
        if self.is_admin() || (self.role == Role::Teacher && self.user_id == teacher_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only the classroom's teacher may do this"))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn user(user_id: u64, role: Role) -> AuthUser {
        AuthUser {
            user_id,
            email: format!("user{user_id}@ace.edu"),
            name: format!("User {user_id}"),
            role,
        }
    }

    #[test]
    fn classroom_ownership() {
        assert!(user(4, Role::Teacher).require_classroom_owner(4).is_ok());
        assert!(user(5, Role::Teacher).require_classroom_owner(4).is_err());
        assert!(user(1, Role::Admin).require_classroom_owner(4).is_ok());
        // a student whose id happens to match is still not an owner
        assert!(user(4, Role::Student).require_classroom_owner(4).is_err());
    }

    #[test]
    fn role_guards() {
        assert!(user(1, Role::Admin).require_teacher().is_err());
        assert!(user(1, Role::Admin).require_teacher_or_admin().is_ok());
        assert!(user(2, Role::Student).require_teacher_or_admin().is_err());
    }

    #[test]
    fn claims_with_unknown_role_are_rejected() {
        let claims = Claims {
            user_id: 1,
            sub: "x@ace.edu".to_string(),
            name: "X".to_string(),
            role: 9,
            exp: 0,
            jti: "j".to_string(),
        };
        assert!(AuthUser::from_claims(claims).is_err());
    }
}
