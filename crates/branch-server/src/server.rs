use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handlers::{conversations, generation, health, messages, navigation};
use crate::state::AppState;

/// Routes and extractor settings, shared by the binary and the HTTP tests.
pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|error, _req| AppError::BadRequest(error.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|error, _req| AppError::BadRequest(error.to_string()).into()),
    )
    .service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::handler))
            .route("/conversations", web::post().to(conversations::create))
            .route("/conversations", web::get().to(conversations::list))
            .route(
                "/conversations/{conversation_id}/history",
                web::get().to(conversations::history),
            )
            .route(
                "/conversations/{conversation_id}/messages",
                web::get().to(conversations::messages),
            )
            .route(
                "/conversations/{conversation_id}/switch",
                web::post().to(navigation::switch),
            )
            .route(
                "/conversations/{conversation_id}/switch-sibling",
                web::post().to(navigation::switch_sibling),
            )
            .route(
                "/conversations/{conversation_id}/send",
                web::post().to(generation::send),
            )
            .route(
                "/conversations/{conversation_id}/edit",
                web::post().to(generation::edit),
            )
            .route(
                "/conversations/{conversation_id}/regenerate",
                web::post().to(generation::regenerate),
            )
            .route(
                "/conversations/{conversation_id}/reply",
                web::post().to(generation::reply),
            )
            .route(
                "/conversations/{conversation_id}/cancel",
                web::post().to(generation::cancel),
            )
            .route(
                "/messages/{message_id}/siblings",
                web::get().to(messages::siblings),
            )
            .route("/messages/{message_id}", web::delete().to(messages::delete)),
    );
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!(
        port = config.port,
        bind_address = %config.bind_address,
        data_dir = %config.data_dir.display(),
        storage = ?config.storage,
        event_log = config.event_log,
        "Starting branch server"
    );

    let state = web::Data::new(AppState::from_config(&config).await?);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await?;

    tracing::info!("Branch server stopped");
    Ok(())
}
