//! Home Assistant HTTP surface
//!
//! The dashboard pages, the extra scripts injected into them, and the static
//! paths integrations register for their bundles.

pub mod frontend;
pub mod static_paths;

pub use frontend::{Frontend, FrontendConfig};
pub use static_paths::{HttpError, StaticPathConfig, StaticPaths, CACHE_HEADER_VALUE};

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the HTTP router
///
/// Frontend routes take precedence; everything else is looked up in the
/// registered static paths.
pub fn create_router(frontend: &Arc<Frontend>, static_paths: &Arc<StaticPaths>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    frontend
        .router()
        .merge(static_paths.router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
