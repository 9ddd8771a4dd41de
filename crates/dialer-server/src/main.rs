use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod adapters;
mod application;
mod auth;
mod config;
mod models;
mod routes;

use adapters::{HttpCallInitiator, PgCallRepository};
use application::{
    CallDispatcher, CallService, CompletionCorrelator, ConcurrencyGate, DispatchLoop,
    ExpirySweeper, RetryScheduler,
};
use config::AppConfig;
use dialer::{CallRepository, RetryPolicy};

/// Type aliases for application services over the shared call store
pub type AppCallService = CallService<dyn CallRepository>;
pub type AppCompletionCorrelator = CompletionCorrelator<dyn CallRepository>;
type AppDispatchLoop = DispatchLoop<dyn CallRepository, HttpCallInitiator>;
type AppExpirySweeper = ExpirySweeper<dyn CallRepository>;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub call_service: Arc<AppCallService>,
    pub correlator: Arc<AppCompletionCorrelator>,
    pub api_key: Option<String>,
    pub signing_secret: Option<String>,
}

#[derive(Serialize)]
struct HealthCheck {
    status: String,
    message: String,
    version: String,
}

async fn health_check() -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "ok".to_string(),
        message: "Dialer API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the HTTP router
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        .merge(routes::call::router())
        .merge(routes::metrics::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // OpenAPI documentation
    let openapi = routes::swagger::ApiDoc::openapi();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", get(health_check))
        .merge(routes::completion::router())
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP API plus the background dispatch loop and expiry sweeper
pub struct DialerService {
    router: Router,
    dispatch_loop: Option<AppDispatchLoop>,
    sweeper: AppExpirySweeper,
}

#[shuttle_runtime::async_trait]
impl shuttle_runtime::Service for DialerService {
    async fn bind(self, addr: SocketAddr) -> Result<(), shuttle_runtime::Error> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut workers = Vec::new();
        if let Some(dispatch_loop) = self.dispatch_loop {
            workers.push(dispatch_loop.start(shutdown_rx.clone()));
        }
        workers.push(self.sweeper.start(shutdown_rx));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("✅ Dialer API listening on {}", addr);

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        // Stop claiming, let in-flight calls finish within the grace period
        let _ = shutdown_tx.send(true);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("❌ Background task ended abnormally: {}", e);
            }
        }

        tracing::info!("👋 Dialer API stopped");
        served.map_err(Into::into)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("⚠️  Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("⚠️  Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> Result<DialerService, shuttle_runtime::Error> {
    tracing::info!("📞 Dialer API initializing...");

    let config = AppConfig::from_lookup(|key| secrets.get(key)).context("Invalid configuration")?;

    if config.api_key.is_some() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No DIALER_API_KEY set - authentication disabled");
    }

    if config.signing_secret.is_some() {
        tracing::info!("🔏 Completion callback signatures required");
    } else {
        tracing::warn!("⚠️  No COMPLETION_SIGNING_SECRET set - callbacks are not verified");
    }

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("✅ Database migrations completed");

    // Initialize application services
    let repo: Arc<dyn CallRepository> = Arc::new(PgCallRepository::new(pool));
    let call_service = Arc::new(CallService::new(repo.clone()));
    let correlator = Arc::new(CompletionCorrelator::new(repo.clone()));

    // Dispatch loop needs a provider
    let dispatch_loop = match config.provider.clone() {
        Some(provider) => {
            tracing::info!("📡 Call provider: {}", provider.base_url);
            let initiator = Arc::new(
                HttpCallInitiator::new(provider).context("Failed to build provider client")?,
            );
            let scheduler = RetryScheduler::new(
                repo.clone(),
                RetryPolicy::new(config.max_retry_attempts),
            );
            let dispatcher = Arc::new(CallDispatcher::new(
                repo.clone(),
                initiator,
                scheduler,
                config.completion_callback_url(),
            ));
            let gate = ConcurrencyGate::new(repo.clone(), config.max_concurrent_calls);
            Some(DispatchLoop::new(
                repo.clone(),
                gate,
                dispatcher,
                config.dispatch.clone(),
            ))
        }
        None => {
            tracing::warn!("⚠️  No PROVIDER_BASE_URL set - dispatch loop disabled");
            None
        }
    };

    if config.pending_ttl.is_none() {
        tracing::warn!("⚠️  PENDING_TTL_SECS is 0 - pending calls never expire");
    }
    let sweeper = ExpirySweeper::new(
        repo.clone(),
        config.pending_ttl,
        config.dispatch_lease,
        config.sweep_interval,
    );

    // Create application state
    let state = AppState {
        call_service,
        correlator,
        api_key: config.api_key.clone(),
        signing_secret: config.signing_secret.clone(),
    };

    let router = build_router(state);

    tracing::info!("📚 Swagger UI: /swagger-ui");
    tracing::info!("✅ Dialer API ready");

    Ok(DialerService {
        router,
        dispatch_loop,
        sweeper,
    })
}
