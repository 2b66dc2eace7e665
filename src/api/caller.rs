use std::future::{ready, Ready};

use actix_web::{dev::Payload, web::Data, FromRequest, HttpRequest};

use crate::api::booking::ServiceError;
use crate::config::{Capability, Role, RoleConfig};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_TYPE_HEADER: &str = "X-User-Type";

/// Identity of the authenticated user making a request.
///
/// Authentication happens upstream; the gateway forwards the user's id and
/// `user_type` in headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub user_type: i32,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: i64, user_type: i32, roles: &RoleConfig) -> Self {
        Self {
            user_id,
            user_type,
            role: roles.role_of(user_type),
        }
    }

    pub fn capability(&self) -> Capability {
        self.role.capability()
    }

    pub fn is_elevated(&self) -> bool {
        self.capability() == Capability::Elevated
    }

    pub fn is_translator(&self) -> bool {
        self.role == Role::Translator
    }
}

fn header_value<T: std::str::FromStr>(req: &HttpRequest, name: &str) -> Result<T, ServiceError> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| ServiceError::Unauthenticated(format!("missing or invalid {} header", name)))
}

fn caller_from(req: &HttpRequest, roles: &RoleConfig) -> Result<Caller, ServiceError> {
    let user_id = header_value(req, USER_ID_HEADER)?;
    let user_type = header_value(req, USER_TYPE_HEADER)?;
    Ok(Caller::new(user_id, user_type, roles))
}

impl FromRequest for Caller {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let roles = req
            .app_data::<Data<RoleConfig>>()
            .map(|roles| *roles.get_ref())
            .unwrap_or_default();

        ready(caller_from(req, &roles))
    }
}
