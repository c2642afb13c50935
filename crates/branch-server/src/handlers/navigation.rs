use actix_web::{web, HttpResponse};
use branch_core::{ConversationId, MessageId};
use serde::Deserialize;

use crate::auth::Caller;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub target_id: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct SwitchSiblingRequest {
    pub message_id: MessageId,
    /// -1 for the previous sibling, 1 for the next one.
    pub offset: isize,
}

pub async fn switch(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    request: web::Json<SwitchRequest>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let active_path = state
        .service
        .switch_branch(&caller.0, &conversation_id, &request.target_id)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "active_path": active_path,
        "current_message_id": active_path.leaf(),
    })))
}

pub async fn switch_sibling(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    request: web::Json<SwitchSiblingRequest>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let active_path = state
        .service
        .switch_sibling(&caller.0, &conversation_id, &request.message_id, request.offset)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "active_path": active_path,
        "current_message_id": active_path.leaf(),
    })))
}
