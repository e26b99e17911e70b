//! Postcraft UI server: drives one workflow over a JSON API and streams its
//! changes to the browser.

mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use postcraft::WorkflowController;
use postcraft::io::config::{DEFAULT_CONFIG_PATH, load_config};
use postcraft::io::services::Services;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "postcraft-ui")]
#[command(about = "Web UI for the guided post-creation workflow")]
struct Args {
    /// Config file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Address to bind the server to (overrides ui.bind)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides ui.port)
    #[arg(long)]
    port: Option<u16>,

    /// Directory containing UI static files (defaults to ./ui/dist)
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("postcraft_ui=info".parse()?)
                .add_directive("postcraft=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    let services = Services::from_config(&config)?;
    info!(backend = %config.backend.base_url, "starting postcraft-ui");

    let state = AppState::new(WorkflowController::new(services));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    let ui_dir = args
        .ui_dir
        .unwrap_or_else(|| PathBuf::from("ui").join("dist"));
    if ui_dir.exists() {
        info!(ui_dir = %ui_dir.display(), "serving static UI files");
        app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
    } else {
        info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
    }

    let bind = args.bind.unwrap_or(config.ui.bind);
    let port = args.port.unwrap_or(config.ui.port);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
