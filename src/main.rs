use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

mod config;
mod database;
mod dtos;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, MailProvider, StorageBackend};
use database::connection::get_db_client;
use services::identity_directory::{
    IdentityDirectory, InMemoryIdentityDirectory, MongoIdentityDirectory,
};
use services::mailer::{HttpMailer, LogMailer, OtpMailer};
use services::otp_dispatcher::{otp_created_channel, OtpDispatcher};
use services::otp_service::OTPService;
use services::otp_store::{InMemoryOtpStore, MongoOtpStore, OtpStore};
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    if let Err(e) = run().await {
        tracing::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!("✅ App config loaded: {}", config.get_config_info());

    let (app_state, dispatcher) = initialize_app_state(&config).await?;
    let app = routes::build_router(app_state);

    start_server(app, &config).await?;

    // The router and every OTP sender are gone; let the dispatcher drain.
    dispatcher.await?;
    Ok(())
}

async fn initialize_app_state(config: &AppConfig) -> anyhow::Result<(AppState, JoinHandle<()>)> {
    let directory: Arc<dyn IdentityDirectory>;
    let otp_store: Arc<dyn OtpStore>;

    match config.storage {
        StorageBackend::MongoDb => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            let db = get_db_client(url, &config.database_name).await?;

            let mongo_directory = MongoIdentityDirectory::new(db.clone(), config.bcrypt_cost);
            mongo_directory.ensure_indexes().await?;

            directory = Arc::new(mongo_directory);
            otp_store = Arc::new(MongoOtpStore::new(db));
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; accounts and codes are lost on restart");
            let memory_directory = InMemoryIdentityDirectory::new(config.bcrypt_cost);
            for (email, password) in &config.seed_accounts {
                memory_directory.create_user(email, password).await?;
            }
            tracing::info!("Seeded {} account(s)", config.seed_accounts.len());

            directory = Arc::new(memory_directory);
            otp_store = Arc::new(InMemoryOtpStore::new());
        }
    }

    let mailer: Arc<dyn OtpMailer> = match &config.mail {
        MailProvider::Log => {
            tracing::warn!("MAIL_PROVIDER=log: OTP codes are written to the log, not emailed");
            Arc::new(LogMailer)
        }
        MailProvider::Http { api_url, api_key, from } => Arc::new(HttpMailer::new(
            api_url.clone(),
            api_key.clone(),
            from.clone(),
            config.otp.ttl_minutes,
        )),
    };

    let (created_tx, created_rx) = otp_created_channel();
    let dispatcher = OtpDispatcher::new(mailer, config.dispatch.clone()).spawn(created_rx);
    tracing::info!("✅ OTP dispatcher started");

    let otp_service = Arc::new(OTPService::new(otp_store, created_tx, config.otp.clone()));
    let app_state = AppState::new(directory, otp_service, config.otp.require_on_reset);

    Ok((app_state, dispatcher))
}

async fn start_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
