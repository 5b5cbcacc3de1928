//! Documentation of a single page review board.
//!
//! Visitors leave a name, a 1-5 rating and a short description. Every review is tagged with
//! the language of its description. Signed in admins can delete reviews.
//!
//!
//!
//! # General Infrastructure
//! - One server renders the page and handles its forms, no client framework
//! - Reviews live in an external document collection (Firestore, Redis or memory)
//! - Identity lives in Firebase Authentication, Google sign in runs as a popup in the browser
//! - Language detection runs in process, see [`language`]
//!
//!
//!
//! # Request Flow
//!
//! ## Submitting
//! - Form posts to `/reviews`
//! - Draft is validated, a rejected draft re-renders with its errors inline (422)
//! - Valid draft gets a language label and is written once
//! - Draft resets, whole collection is re-read, browser is redirected to `/`
//!
//! ## Deleting
//! - Only rendered while a session is present, and checked again on `/reviews/{id}/delete`
//! - Anonymous deletes never reach the store (401)
//! - Successful delete re-reads the collection
//!
//! ## Store outages
//! - Nothing is retried
//! - The page keeps showing the last list it managed to read
//! - A failed write keeps the draft so the user can resubmit
//!
//!
//!
//! # Notes
//!
//! ## Session
//! There is exactly one session per process, like the browser app this page replaces where the
//! page observed one auth state. The server binds to `127.0.0.1` by default for that reason,
//! anyone who can reach it shares the admin view once someone signs in.
//!
//! ## Consistency
//! Read after write, nothing more. Two requests racing each other both end with a full
//! refresh, whichever finishes last decides what the page shows.
//!
//!
//!
//! # Setup
//!
//! Run against the in memory store.
//! ```sh
//! RUST_LOG=info cargo run -p reviews
//! ```
//!
//! Run against Firestore.
//! ```sh
//! STORE_BACKEND=firestore FIREBASE_PROJECT_ID=my-project GOOGLE_CLIENT_ID=xyz.apps.googleusercontent.com \
//!   cargo run -p reviews
//! ```
//! The web API key is read from `/run/secrets/FIREBASE_API_KEY`, or `FIREBASE_API_KEY`.
//!
//! Run against Redis.
//! ```sh
//! STORE_BACKEND=redis REDIS_URL=redis://127.0.0.1:6379 cargo run -p reviews
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use signal::ctrl_c;
#[cfg(unix)]
use signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod firestore;
pub mod form;
pub mod language;
pub mod memory;
pub mod page;
pub mod render;
pub mod routes;
pub mod state;

use config::Config;
use routes::{
    delete_handler, google_handler, health_handler, logout_handler, page_handler,
    register_handler, submit_handler,
};
use state::State;

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/reviews", post(submit_handler))
        .route("/reviews/{id}/delete", post(delete_handler))
        .route("/auth/google", post(google_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");
    let app = router(state.clone());

    let address = state.config.address();
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.page.teardown();
    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
