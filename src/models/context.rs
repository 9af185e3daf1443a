use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use std::future::{Ready, ready};

/// Who is calling. Resolved once by the auth middleware and passed explicitly
/// into every service call that needs a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: i32,
    pub role: UserRole,
}

impl RequestContext {
    pub fn new(user_id: i32, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_therapist(&self) -> bool {
        self.role == UserRole::Therapist
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// Therapists act on their own behalf; admins may act for anyone.
    pub fn require_therapist(&self) -> AppResult<()> {
        if self.is_therapist() || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    pub fn require_self_or_admin(&self, user_id: i32) -> AppResult<()> {
        if self.user_id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }
}

impl FromRequest for RequestContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<RequestContext>()
                .copied()
                .ok_or_else(|| AppError::AuthError("Missing access token".to_string())),
        )
    }
}
