use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use hrm_sync::config::Config;
use hrm_sync::db::init_db;
use hrm_sync::docs::ApiDoc;
use hrm_sync::realtime::Broadcaster;
use hrm_sync::recon::ReconEngine;
use hrm_sync::registry::MySqlDeviceRegistry;
use hrm_sync::scheduler::SyncScheduler;
use hrm_sync::store::mysql::{MySqlAttendanceStore, MySqlEmployeeStore};
use hrm_sync::terminal::TcpTerminalLink;
use hrm_sync::{registry::DeviceRegistry, routes, store::AttendanceStore, store::EmployeeStore};

#[get("/")]
async fn index() -> impl Responder {
    "Hello World!"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let registry: Arc<dyn DeviceRegistry> = Arc::new(MySqlDeviceRegistry::new(pool.clone()));
    let employees: Arc<dyn EmployeeStore> = Arc::new(MySqlEmployeeStore::new(pool.clone()));
    let ledger: Arc<dyn AttendanceStore> = Arc::new(MySqlAttendanceStore::new(pool.clone()));
    let broadcaster = Arc::new(Broadcaster::new());

    let engine = Arc::new(ReconEngine::new(
        Arc::clone(&employees),
        ledger,
        Arc::clone(&broadcaster),
        config.recon_policy(),
    ));

    let scheduler = Arc::new(SyncScheduler::new(
        registry,
        Arc::new(TcpTerminalLink),
        engine,
        employees,
        Arc::clone(&broadcaster),
        config.scheduler_config(),
    ));

    if let Err(e) = scheduler.start().await {
        tracing::error!(error = %e, "Failed to start sync scheduler");
    }

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();
    let scheduler_data = Arc::clone(&scheduler);

    let result = HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(scheduler_data.clone()))
            .app_data(Data::new(config_data.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await;

    // Let in-flight syncs drain before the process exits
    scheduler.shutdown().await;
    broadcaster.shutdown_all().await;

    result
}
