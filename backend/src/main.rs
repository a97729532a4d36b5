use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use chrono::{Datelike, Local};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};

use cobranca_tracker_backend::rest::{self, AppState};
use cobranca_tracker_backend::Backend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; log-macro records from the domain layer are
    // routed through the same subscriber
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let data_directory = std::env::var("COBRANCA_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));
    info!("Using data directory {:?}", data_directory);

    let backend = Arc::new(Backend::new(data_directory)?);

    // The legacy import trigger targets one configured period; default to
    // the current month
    let today = Local::now().date_naive();
    let import_target = std::env::var("IMPORT_TARGET_MONTH")
        .unwrap_or_else(|_| format!("{:02}-{}", today.month(), today.year()));

    let state = AppState::new(backend, import_target);

    // CORS setup to allow the board frontend to make requests
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:8080".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/months/:period/students", get(rest::list_students))
        .route("/students", post(rest::register_student))
        .route("/students/import", post(rest::import_rows))
        .route("/students/:id", put(rest::update_student).delete(rest::delete_student))
        .route("/students/:id/advance", post(rest::advance_status))
        .route("/students/:id/revert", post(rest::revert_status))
        .route("/students/:id/follow-ups", post(rest::add_follow_up))
        .route("/follow-ups/:id", put(rest::update_follow_up).delete(rest::delete_follow_up))
        .route("/months", get(rest::list_months).post(rest::create_month));

    let app = Router::new()
        .nest("/api", api_routes)
        .route("/delete-month", post(rest::delete_month))
        .route("/import", get(rest::import_previous_month))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
