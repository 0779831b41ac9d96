/// HTTP server setup and routing
use crate::{
    api,
    context::AppContext,
    error::{LarkmError, LarkmResult},
};
use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(api::routes())
        // Anything that is not a management route is an ARK to resolve (or a 404)
        .fallback(api::resolver::resolve)
        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> LarkmResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("larkm listening on {}", addr);
    info!("   Default ARK prefix: ark:{}/{}", ctx.config.naming.default_naan, ctx.config.naming.default_shoulder);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LarkmError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    // Peer addresses feed the trusted-IP and private-shoulder checks
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| LarkmError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
