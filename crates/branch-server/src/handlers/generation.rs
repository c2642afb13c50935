//! Send / edit / regenerate and the reply half of a generation.
//!
//! The model is invoked by the client between `send` (or `edit`,
//! `regenerate`) and `reply`; no lock is held in between.

use actix_web::{web, HttpResponse};
use branch_core::{ConversationId, MessageId};
use serde::Deserialize;

use crate::auth::Caller;
use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub message_id: MessageId,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateRequest {
    pub message_id: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub parent_id: MessageId,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub parent_id: MessageId,
    #[serde(default)]
    pub partial_content: Option<String>,
}

pub async fn send(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    request: web::Json<SendRequest>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let SendRequest { parent_id, content } = request.into_inner();
    let outcome = state
        .service
        .send(&caller.0, &conversation_id, parent_id, content)
        .await?;
    Ok(HttpResponse::Created().json(outcome))
}

pub async fn edit(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    request: web::Json<EditRequest>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let EditRequest { message_id, content } = request.into_inner();
    let outcome = state
        .service
        .edit(&caller.0, &conversation_id, &message_id, content)
        .await?;
    Ok(HttpResponse::Created().json(outcome))
}

pub async fn regenerate(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    request: web::Json<RegenerateRequest>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let outcome = state
        .service
        .prepare_regenerate(&caller.0, &conversation_id, &request.message_id)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn reply(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    request: web::Json<ReplyRequest>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let ReplyRequest { parent_id, content } = request.into_inner();
    let message = state
        .service
        .commit_reply(&caller.0, &conversation_id, &parent_id, content)
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "new_leaf_id": message.id,
        "message": message,
    })))
}

pub async fn cancel(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    request: web::Json<CancelRequest>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let CancelRequest {
        parent_id,
        partial_content,
    } = request.into_inner();
    let partial = state
        .service
        .cancel_reply(&caller.0, &conversation_id, &parent_id, partial_content)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "partial": partial })))
}
