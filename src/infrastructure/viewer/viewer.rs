use uuid::Uuid;

use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::models::User;

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// Request-scoped viewer: who is asking, or nobody.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub request_id: String,
    pub principal: Option<Principal>,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        Self {
            request_id,
            principal: None,
        }
    }

    pub fn authenticated(request_id: String, principal: Principal) -> Self {
        Self {
            request_id,
            principal: Some(principal),
        }
    }

    /// Viewer for `user` with a freshly generated request id.
    pub fn for_user(user: &User) -> Self {
        Self::authenticated(new_request_id(), Principal::from(user))
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.principal.as_ref().map(|p| p.id)
    }

    pub fn require_user(&self) -> AppResult<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

pub fn new_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}
