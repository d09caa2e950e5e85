//! # arcana-api: HTTP Surface
//!
//! | Route | Operation |
//! |---|---|
//! | `GET /`, `GET /health` | service identity, backend reachability (no auth) |
//! | `GET /status`, `GET /networks` | totals, configured networks |
//! | `POST /register` | store + compile a circuit |
//! | `GET /circuits`, `GET /circuits/:id` | circuit views |
//! | `POST /deploy` | unsigned verifier deployment transaction |
//! | `POST /proof` | proof + unsigned verification transaction |
//! | `POST /broadcast` | submit a client-signed transaction |
//! | `POST /circuits/:id/reconcile` | re-check a timed-out broadcast |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → DefaultBodyLimit → Handler
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Circuit sources are capped well below this; the limit guards the JSON
/// envelope around them.
const BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Assemble the router. `/` and `/health` stay reachable without a token.
pub fn app(state: AppState) -> Router {
    let auth = state.auth.clone();

    let api = Router::new()
        .merge(routes::circuits::router())
        .merge(routes::transactions::router())
        .merge(routes::service::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(from_fn(auth::auth_middleware))
        .layer(Extension(auth));

    Router::new()
        .merge(routes::service::public_router())
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
