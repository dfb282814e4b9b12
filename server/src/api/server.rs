//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use super::auth::require_auth;
use super::middleware::{self, AllowedOrigins};
use super::routes;
use super::state::ApiState;
use crate::app::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);
        Self { app, allowed_origins }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self { app, allowed_origins } = self;

        let shutdown = app.shutdown.clone();
        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(host.parse()?, port);

        let state = ApiState {
            conversations: app.conversations.clone(),
            jobs: app.jobs.clone(),
            events: app.events.clone(),
            sessions: app.sessions.clone(),
            scheduler: app.scheduler.clone(),
            adapters: app.adapters.clone(),
            query_service: app.query_service.clone(),
            pipeline_config: app.pipeline_config(),
            auth_config: app.config.auth.clone(),
        };

        let protected_routes = routes::protected_routes().layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

        let router = Router::new()
            .nest(
                "/api/v1",
                Router::new()
                    .merge(routes::public_routes())
                    .merge(protected_routes),
            )
            .with_state(state)
            .fallback(middleware::handle_404)
            .layer(CompressionLayer::new())
            .layer(middleware::cors(&allowed_origins))
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

        let listener = TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.wait())
        .await?;

        Ok(app)
    }
}
