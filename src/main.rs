use conference_portal::{
    AppState, LogMailer, MailerState, OtpStore, SmtpMailer,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{FileStore, S3FileStore, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Startup order: configuration, logging, database, file store, mailer, server.
/// Any failure before the server is listening is fatal.
#[tokio::main]
async fn main() {
    // 1. Configuration (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise the per-environment default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.env.default_log_filter().into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database (Postgres). The schema in db/schema.sql is applied out of band.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. File store (S3/MinIO)
    let s3_store = S3FileStore::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // LOCAL-ONLY: create the MinIO bucket on first start.
    if config.env == Env::Local {
        s3_store.ensure_bucket_exists().await;
    }

    let storage = Arc::new(s3_store) as StorageState;

    // 5. Mailer: SMTP when configured, otherwise messages are only logged.
    let mailer: MailerState = match &config.smtp {
        Some(smtp) => {
            let smtp_mailer = SmtpMailer::new(smtp)
                .unwrap_or_else(|e| panic!("FATAL: invalid SMTP configuration: {e}"));
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP mailer configured");
            Arc::new(smtp_mailer)
        }
        None => {
            tracing::warn!("SMTP_HOST not set; outgoing mail will only be logged");
            Arc::new(LogMailer)
        }
    };

    let otp = Arc::new(OtpStore::new(&config.otp));
    let bind_addr = config.bind_addr.clone();

    // 6. Unified State Assembly
    let app_state = AppState {
        repo,
        storage,
        mailer,
        otp,
        config,
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: cannot bind {bind_addr}: {e}"));

    tracing::info!("Listening on {bind_addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly");
}
