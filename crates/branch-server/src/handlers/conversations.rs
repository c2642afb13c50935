use actix_web::{web, HttpResponse};
use branch_core::ConversationId;
use branch_service::HistoryView;
use serde::Deserialize;

use crate::auth::Caller;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub view: Option<String>,
}

pub async fn create(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse> {
    let conversation = state.service.create_conversation(&caller.0).await?;
    Ok(HttpResponse::Created().json(conversation))
}

pub async fn list(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse> {
    let conversations = state.service.list_conversations(&caller.0).await?;
    Ok(HttpResponse::Ok().json(conversations))
}

pub async fn history(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let view = match query.view.as_deref() {
        None => state.default_history_view,
        Some(raw) => HistoryView::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!("unknown history view '{raw}', expected tree or path"))
        })?,
    };

    let history = state
        .service
        .get_history(&caller.0, &conversation_id, view)
        .await?;
    Ok(HttpResponse::Ok().json(history))
}

pub async fn messages(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let conversation_id = ConversationId::new(path.into_inner());
    let messages = state.service.flat_history(&caller.0, &conversation_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}
