use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use uuid::Uuid;

use crate::domain::principal::Principal;
use crate::errors::AppError;

/// Header carrying the authenticated user's id, set by the upstream auth gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Rejects the request with 401 unless the caller has been authenticated.
impl FromRequest for Principal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let principal = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Principal::new)
            .ok_or(AppError::Unauthorized);
        ready(principal)
    }
}
