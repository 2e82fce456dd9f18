use axum::{
    http::Method,
    routing::{get, patch},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod error;
mod handlers;
mod playbooks;
mod services;
mod websocket;

pub use error::{ApiError, ApiResult, AppError};

#[cfg(test)]
mod tests;

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub ws_manager: Arc<websocket::WsManager>,
    pub playbooks: Arc<playbooks::PlaybookEngine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    let db_pool = database::create_pool(&config.database_url).await?;

    database::migrate(&db_pool).await?;

    let ws_manager = Arc::new(websocket::WsManager::new());
    let email_service = Arc::new(services::EmailService::new(config.smtp.clone())?);

    let store: Arc<dyn playbooks::PlaybookStore> =
        Arc::new(playbooks::store::PgPlaybookStore::new(db_pool.clone()));
    let recorder: Arc<dyn playbooks::ExecutionRecorder> =
        Arc::new(playbooks::recorder::PgExecutionRecorder::new(db_pool.clone()));
    let gateways = playbooks::Gateways::production(
        db_pool.clone(),
        email_service,
        ws_manager.clone(),
        &config,
    );
    let executor = playbooks::PlaybookExecutor::new(store.clone(), recorder, gateways);
    let engine = Arc::new(playbooks::PlaybookEngine::new(store, executor));

    engine.install_defaults().await?;

    let app_state = Arc::new(AppState {
        db_pool,
        ws_manager,
        playbooks: engine,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route(
            "/api/v1/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route(
            "/api/v1/customers/:id",
            get(handlers::customers::get_customer).put(handlers::customers::update_customer),
        )
        .route(
            "/api/v1/customers/:id/contacts",
            get(handlers::customers::list_customer_contacts),
        )
        .route(
            "/api/v1/customers/:id/tasks",
            get(handlers::customers::list_customer_tasks),
        )
        .route(
            "/api/v1/customers/:id/activity",
            get(handlers::customers::list_customer_activity),
        )
        .route(
            "/api/v1/playbooks",
            get(handlers::playbooks::list_playbooks).post(handlers::playbooks::create_playbook),
        )
        .route(
            "/api/v1/playbooks/:id/enabled",
            patch(handlers::playbooks::set_playbook_enabled),
        )
        .route(
            "/api/v1/playbooks/:id/executions",
            get(handlers::playbooks::list_playbook_executions),
        )
        .route("/ws", get(websocket::websocket_handler))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
