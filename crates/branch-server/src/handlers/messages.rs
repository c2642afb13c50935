use actix_web::{web, HttpResponse};
use branch_core::MessageId;

use crate::auth::Caller;
use crate::error::Result;
use crate::state::AppState;

pub async fn siblings(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let message_id = MessageId::new(path.into_inner());
    let info = state.service.get_siblings(&caller.0, &message_id).await?;
    Ok(HttpResponse::Ok().json(info))
}

pub async fn delete(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let message_id = MessageId::new(path.into_inner());
    let message = state.service.delete_message(&caller.0, &message_id).await?;
    Ok(HttpResponse::Ok().json(message))
}
