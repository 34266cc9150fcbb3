use farm_notify::db::{create_pool, run_migrations};
use farm_notify::notification::{NotificationRepository, NotificationService};
use farm_notify::routes::create_router;
use farm_notify::state::{AppState, Config};
use farm_notify::user::UserRepository;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,farm_notify=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    tracing::info!("Connecting to database...");
    let db = create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Fan-out channel for SSE subscribers
    let (notification_tx, _) = broadcast::channel(100);

    // Create repositories and services
    let user_repository = UserRepository::new(db.clone());
    let notification_repository = NotificationRepository::new(db.clone());
    let notification_service =
        NotificationService::new(notification_repository.clone(), user_repository.clone());

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        notification_tx: notification_tx.clone(),
        user_repository,
        notification_repository,
        notification_service,
    };

    let app = create_router(state);

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
