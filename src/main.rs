use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::time::Duration;
use tokio::time;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

mod constants;
mod database;
mod handlers;
mod models;
mod services;
mod utils;

use handlers::{movements, pallets, reports, tasks};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct DatabaseStatusResponse {
    pub success: bool,
    pub database: String,
    pub pool: database::PoolStatus,
    pub timestamp: String,
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        message: "Pallet ledger backend is running".to_string(),
        timestamp: utils::warehouse_now_rfc3339(),
        version: VERSION.to_string(),
    })
}

/// Database status endpoint - shows current database configuration
async fn database_status(State(database): State<database::Database>) -> Json<DatabaseStatusResponse> {
    Json(DatabaseStatusResponse {
        success: true,
        database: database.get_database_name().to_string(),
        pool: database.get_pool_status(),
        timestamp: utils::warehouse_now_rfc3339(),
    })
}

#[tokio::main]
async fn main() {
    // Initialize tracing with environment-based filtering
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "pallet_backend=info,tower_http=warn".to_string()
        } else {
            "pallet_backend=warn,tower_http=error".to_string()
        }
    });

    std::env::set_var("RUST_LOG", &log_level);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("🚀 Starting Pallet Ledger Backend v{}", VERSION);

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Server configuration
    let host = std::env::var("SERVER_HOST")
        .unwrap_or_else(|_| constants::DEFAULT_SERVER_HOST.to_string());
    let port = std::env::var("SERVER_PORT")
        .unwrap_or_else(|_| constants::DEFAULT_SERVER_PORT.to_string())
        .parse::<u16>()
        .unwrap_or(constants::DEFAULT_SERVER_PORT);

    // CORS configuration
    let cors_origins = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    info!("Server configured to run on {}:{}", host, port);
    info!("CORS origins: {}", cors_origins);

    // Initialize database connection with pooling
    let database = database::Database::new()
        .await
        .expect("Failed to initialize database with connection pool");

    // Validate ledger tables exist in database
    info!("🔍 Validating ledger tables in database...");
    for table in constants::LEDGER_TABLES {
        match database.table_exists(table).await {
            Ok(true) => {
                info!("✅ Ledger table '{}' found in database", table);
            }
            Ok(false) => {
                warn!("⚠️  Ledger table '{}' not found in database", table);
                warn!("    Run scripts/schema.sql against the configured database");
            }
            Err(e) => {
                warn!("⚠️  Failed to check ledger table '{}': {}", table, e);
            }
        }
    }

    // Configure CORS with proper origin validation
    let cors = if cors_origins == "*" {
        // Block wildcard CORS in production
        if std::env::var("RUST_ENV").unwrap_or_default() == "production" {
            panic!("CORS wildcard (*) is not allowed in production. Set CORS_ORIGINS to specific origins.");
        }
        warn!("⚠️ CORS is configured with wildcard (*) - this is only acceptable for development!");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        info!("🔒 CORS configured for specific origins: {}", cors_origins);
        let origins: Vec<axum::http::HeaderValue> = cors_origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();

        if origins.is_empty() {
            warn!("⚠️ No valid CORS origins found in CORS_ORIGINS, falling back to localhost only");
            CorsLayer::new()
                .allow_origin(
                    "http://localhost:4200"
                        .parse::<axum::http::HeaderValue>()
                        .unwrap(),
                )
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true)
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true)
        }
    };

    // Security headers middleware
    let security_headers = tower_http::set_header::SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    let x_frame_options = tower_http::set_header::SetResponseHeaderLayer::overriding(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );

    // Build application with ledger routes
    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/database/status", get(database_status))
        .nest("/api/pallets", pallets::create_pallet_routes())
        .nest("/api/tasks", tasks::create_task_routes())
        .nest("/api/movements", movements::create_movement_routes())
        .nest("/api/admin", movements::create_admin_routes())
        .nest("/api/report", reports::create_report_routes())
        .layer(cors)
        .layer(security_headers)
        .layer(x_frame_options)
        .with_state(database.clone());

    let listener = tokio::net::TcpListener::bind(&format!("{host}:{port}"))
        .await
        .expect("Failed to bind to address");

    info!("🎯 Pallet ledger server started successfully on http://{}:{}", host, port);
    info!("🔧 API endpoints available at http://{}:{}/api/", host, port);

    // Spawn connection pool monitoring task
    let db_for_monitoring = database.clone();
    tokio::spawn(async move {
        monitor_pool_health(db_for_monitoring).await;
    });

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}

/// Monitor connection pool health and log warnings
async fn monitor_pool_health(database: database::Database) {
    loop {
        time::sleep(Duration::from_secs(constants::POOL_MONITOR_INTERVAL_SECS)).await;
        let pool_status = database.get_pool_status();
        let usage_percent =
            (pool_status.total_connections as f64 / pool_status.max_size as f64) * 100.0;

        if usage_percent >= constants::POOL_HIGH_USAGE_THRESHOLD {
            error!(
                connections = pool_status.total_connections,
                idle = pool_status.idle_connections,
                max = pool_status.max_size,
                utilization = %format!("{:.1}%", usage_percent),
                "⚠️ Connection pool utilization HIGH - consider increasing DATABASE_MAX_CONNECTIONS"
            );
        } else if usage_percent >= constants::POOL_ELEVATED_USAGE_THRESHOLD {
            info!(
                connections = pool_status.total_connections,
                idle = pool_status.idle_connections,
                max = pool_status.max_size,
                utilization = %format!("{:.1}%", usage_percent),
                "⚡ Connection pool utilization elevated"
            );
        }
    }
}
