//! HTTP 服务器装配

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::handlers;
use crate::state::AppState;

/// 构建路由
pub fn create_router(state: AppState, cors: bool) -> Router {
    let api = Router::new()
        .route(
            "/sessions",
            post(handlers::sessions::create_session).get(handlers::sessions::list_sessions),
        )
        .route(
            "/sessions/:session_id",
            get(handlers::sessions::get_session).patch(handlers::sessions::update_session),
        )
        .route(
            "/sessions/:session_id/messages",
            post(handlers::sessions::append_message),
        )
        .route(
            "/sessions/:session_id/complete",
            post(handlers::sessions::complete_session),
        )
        .route(
            "/sessions/:session_id/stream",
            get(handlers::stream::stream_session),
        );

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// 启动服务器并阻塞到退出
pub async fn run_server(state: AppState, host: &str, port: u16, cors: bool) -> Result<()> {
    let router = create_router(state, cors);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Lemma server listening on http://{}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}
