//! LinkedIn login demo
//!
//! Minimal web application showing the full authorization-code round-trip:
//! 1. Serves a login link built by the client
//! 2. Receives the redirect back with `code`/`state`
//! 3. Exchanges the code and shows the user's profile
//!
//! Storage is a single shared in-memory store, so this demo supports one
//! browser session at a time. Real applications back the store with their
//! session layer and construct one client per inbound request.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::Uri;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkedin_oauth::{
    ApiOptions, CallbackParams, DataStorage, InMemoryStorage, LinkedIn, LoginOptions,
    RequestContext, UrlGenerator,
};

use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    storage: Arc<InMemoryStorage>,
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/logout", get(logout_handler))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting linkedin-login-demo");

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    if config.app.client_secret.is_none() {
        anyhow::bail!(
            "no client secret configured: set LINKEDIN_CLIENT_SECRET or client_secret_file"
        );
    }

    info!(
        listen_addr = %config.server.listen_addr,
        public_url = %config.server.public_url,
        client_id = %config.app.client_id,
        "configuration loaded"
    );

    let listen_addr = config.server.listen_addr;
    let state = AppState {
        config: Arc::new(config),
        storage: Arc::new(InMemoryStorage::new()),
    };

    let app = build_router(state);
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;

    info!(addr = %listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

/// The one page. Shows a consent denial, the profile of an authenticated
/// user, or a login link, depending on where in the flow we are.
async fn index_handler(State(state): State<AppState>, uri: Uri) -> Response {
    let callback = CallbackParams::from_query(uri.query().unwrap_or(""));

    let mut linkedin = match build_client(&state, &uri, callback) {
        Ok(client) => client,
        Err(e) => return error_page(&e.to_string()),
    };

    if let Some(login_error) = linkedin.login_error() {
        return Html(format!(
            "<h1>Login failed</h1><p>{}: {}</p><p><a href=\"/\">Try again</a></p>",
            escape(login_error.name()),
            escape(login_error.description()),
        ))
        .into_response();
    }

    match linkedin.is_authenticated().await {
        Ok(true) => {
            let profile = linkedin
                .get("/v1/people/~:(id,firstName,lastName)", ApiOptions::new())
                .await;
            let rendered = match profile.as_ref().ok().and_then(|p| p.as_json()) {
                Some(value) => serde_json::to_string_pretty(value).unwrap_or_default(),
                None => "profile unavailable".to_string(),
            };
            Html(format!(
                "<h1>You are logged in</h1><pre>{}</pre><p><a href=\"/logout\">Logout</a></p>",
                escape(&rendered),
            ))
            .into_response()
        }
        Ok(false) => {
            let options = LoginOptions::new().scope_list(state.config.app.scopes.clone());
            match linkedin.login_url(options) {
                Ok(url) => Html(format!(
                    "<h1>LinkedIn login demo</h1><p><a href=\"{url}\">Login with LinkedIn</a></p>",
                ))
                .into_response(),
                Err(e) => error_page(&e.to_string()),
            }
        }
        Err(e) => {
            error!(error = %e, "login flow failed");
            error_page(&e.to_string())
        }
    }
}

/// Forget the stored protocol state and start over.
async fn logout_handler(State(state): State<AppState>) -> Response {
    if let Err(e) = state.storage.clear_all() {
        error!(error = %e, "failed to clear storage");
        return error_page(&e.to_string());
    }
    Redirect::to("/").into_response()
}

/// Construct a per-request client over the shared store, with the inbound
/// URL reconstructed from the configured public base.
fn build_client(state: &AppState, uri: &Uri, callback: CallbackParams) -> Result<LinkedIn> {
    let public = url::Url::parse(&state.config.server.public_url).context("bad public_url")?;
    let host = match (public.host_str(), public.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => anyhow::bail!("public_url has no host"),
    };
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| "/".to_string());

    let urls = UrlGenerator::new().with_request_context(RequestContext {
        scheme: public.scheme().to_string(),
        host,
        path_and_query,
        forwarded_proto: None,
        forwarded_host: None,
    });

    let secret = state
        .config
        .app
        .client_secret
        .clone()
        .context("no client secret configured")?;

    Ok(LinkedIn::new(state.config.app.client_id.clone(), secret)
        .with_storage(state.storage.clone())
        .with_url_builder(Arc::new(urls))
        .with_callback(callback))
}

fn error_page(message: &str) -> Response {
    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("<h1>Something went wrong</h1><p>{}</p>", escape(message))),
    )
        .into_response()
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
