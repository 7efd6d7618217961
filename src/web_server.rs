use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::config::ProxyConfig;
use crate::constants::FALLBACK_QUESTIONS;
use crate::error::{ErrorResponse, ProxyError};
use crate::proxy::{ChatProxy, ChatRequest, ProxyResponse};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    proxy: Arc<ChatProxy>,
    templates: Arc<AutoReloader>,
}

impl AppState {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let proxy = ChatProxy::new(config).context("Failed to build upstream client")?;
        Ok(Self {
            proxy: Arc::new(proxy),
            templates: Arc::new(create_minijinja_env(config.template_dir.clone())),
        })
    }
}

fn create_minijinja_env(template_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&template_dir));
        notifier.watch_path(&template_dir, true);
        Ok(env)
    })
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, Response> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                tmpl.render(minijinja::context! {
                    title => "LOGIQ CURVE LLC",
                    chat_endpoint => "/api/chat",
                    example_questions => FALLBACK_QUESTIONS,
                })
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        })
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ProxyResponse>, ProxyError> {
    let Json(request) = payload?;
    let response = state.proxy.handle(&request.messages).await?;
    Ok(Json(response))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("route not found")),
    )
        .into_response()
}

pub fn build_router(state: AppState, static_dir: PathBuf) -> Router {
    let static_files_service = ServeDir::new(static_dir).not_found_service(tower::service_fn(
        |_: axum::extract::Request| async {
            Ok::<_, std::convert::Infallible>(not_found().await)
        },
    ));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .nest_service("/static", static_files_service)
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub fn build_app(config: &ProxyConfig) -> Result<Router> {
    let state = AppState::new(config)?;
    Ok(build_router(state, config.static_dir.clone()))
}

pub async fn start_web_server(port: u16, config: ProxyConfig) -> Result<()> {
    let app = build_app(&config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(
        upstream = %config.upstream_url,
        history = ?config.history_policy,
        "Web server listening on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
