use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use branch_service::CallerContext;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from the `X-User-Id` header.
///
/// Authentication happens upstream; this only forwards who the upstream
/// layer says is calling.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerContext);

impl FromRequest for Caller {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        ready(match user_id {
            Some(user_id) => Ok(Caller(CallerContext::new(user_id))),
            None => Err(AppError::MissingUser),
        })
    }
}
