use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use booking_dispatch::api::booking::BookingService;
use booking_dispatch::api::validation;
use booking_dispatch::cli::{Cli, Command};
use booking_dispatch::config::Config;
use booking_dispatch::db::{self, JobRepository, MemoryStore};
use booking_dispatch::matching::LanguageMatch;
use booking_dispatch::notify::LogTransport;
use booking_dispatch::shutdown::ShutdownCoordinator;

/// Console output plus one daily-rotated file per level under `log_dir`,
/// e.g. logs/info.log.2025-01-01, logs/error.log.2025-01-01
fn init_tracing(log_dir: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "info.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "warn.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "error.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "debug.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().map_err(std::io::Error::other)?;

    std::fs::create_dir_all(&config.log_dir)?;
    init_tracing(&config.log_dir);

    let pool = match &config.database_url {
        Some(url) => {
            let pool = db::connection::get_connection(url, config.max_db_connections)
                .await
                .map_err(std::io::Error::other)?;
            info!("Database connection pool established");
            Some(pool)
        }
        None => None,
    };

    if cli.command() == &Command::Migrate {
        let Some(pool) = pool else {
            return Err(std::io::Error::other("DATABASE_URL must be set to run migrations"));
        };
        db::migrations::run_migrations(&pool)
            .await
            .map_err(std::io::Error::other)?;
        pool.close().await;
        return Ok(());
    }

    info!("Starting booking-dispatch");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Notification timeout: {:?}", config.notification_timeout);

    let transport = Arc::new(LogTransport);
    let policy = Arc::new(LanguageMatch);

    let service = match &pool {
        Some(pool) => {
            db::migrations::run_migrations(pool)
                .await
                .map_err(std::io::Error::other)?;
            BookingService::new(
                Arc::new(JobRepository::new(pool.clone())),
                transport,
                policy,
                config.roles,
                config.notification_timeout,
            )
        }
        None => {
            warn!("DATABASE_URL not set, bookings are kept in memory and lost on restart");
            let store = Arc::new(MemoryStore::new());
            if let Some(path) = &config.users_file {
                let loaded = store.load_users(path).await.map_err(std::io::Error::other)?;
                info!("Loaded {} users from {}", loaded, path);
            }
            BookingService::new(
                store,
                transport,
                policy,
                config.roles,
                config.notification_timeout,
            )
        }
    };

    let service = web::Data::new(service);
    let roles = web::Data::new(config.roles);
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(roles.clone())
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::json_config().limit(max_payload_size))
            .app_data(validation::query_config())
            .configure(booking_dispatch::routes)
    })
    .bind(config.bind_addr.as_str())?
    .run();

    info!("Server listening on http://{}", config.bind_addr);

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    ShutdownCoordinator::new(server_handle, server_task, pool)
        .wait_for_shutdown()
        .await
}
