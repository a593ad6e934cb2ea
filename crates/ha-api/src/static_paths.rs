//! Static path registration
//!
//! Integrations mount directories or single files of their bundle under a
//! URL prefix. Requests not handled by another route are resolved against
//! the registered mounts, longest prefix first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info};

/// Cache-Control value used when a mount asks for cache headers
pub const CACHE_HEADER_VALUE: &str = "public, max-age=31536000";

/// HTTP registration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("URL path {url_path} is already registered for {existing}")]
    PathConflict { url_path: String, existing: String },

    #[error("Invalid URL path {0:?}: must start with '/'")]
    InvalidUrlPath(String),
}

/// A URL prefix mapped onto a file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPathConfig {
    pub url_path: String,
    pub path: PathBuf,
    pub cache_headers: bool,
}

impl StaticPathConfig {
    pub fn new(url_path: impl Into<String>, path: impl Into<PathBuf>, cache_headers: bool) -> Self {
        Self {
            url_path: url_path.into(),
            path: path.into(),
            cache_headers,
        }
    }
}

fn conflict(config: &StaticPathConfig, existing: &StaticPathConfig) -> HttpError {
    HttpError::PathConflict {
        url_path: config.url_path.clone(),
        existing: existing.path.display().to_string(),
    }
}

/// Registry of static mounts
#[derive(Default)]
pub struct StaticPaths {
    mounts: DashMap<String, StaticPathConfig>,
}

impl StaticPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register several mounts at once
    ///
    /// All configs are checked before any is added. If a conflicting mount
    /// appears while they are being added, the ones added by this call are
    /// removed again.
    pub async fn register_static_paths(
        &self,
        configs: Vec<StaticPathConfig>,
    ) -> Result<(), HttpError> {
        for config in &configs {
            self.check(config)?;
        }

        let mut added = Vec::new();
        for config in configs {
            let url_path = config.url_path.clone();
            match self.insert(config) {
                Ok(true) => added.push(url_path),
                Ok(false) => {}
                Err(e) => {
                    for url_path in added {
                        self.mounts.remove(&url_path);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Register a single mount (legacy synchronous call)
    pub fn register_static_path(
        &self,
        url_path: &str,
        path: impl AsRef<Path>,
        cache_headers: bool,
    ) -> Result<(), HttpError> {
        let config = StaticPathConfig::new(url_path, path.as_ref(), cache_headers);
        self.check(&config)?;
        self.insert(config)?;
        Ok(())
    }

    fn check(&self, config: &StaticPathConfig) -> Result<(), HttpError> {
        if !config.url_path.starts_with('/') {
            return Err(HttpError::InvalidUrlPath(config.url_path.clone()));
        }
        match self.mounts.get(&config.url_path) {
            Some(existing) if *existing != *config => Err(conflict(config, &existing)),
            _ => Ok(()),
        }
    }

    /// Add a mount, returning whether it was new
    ///
    /// Re-registering an identical mount is a no-op. The lookup and the
    /// insert hold the same shard lock.
    fn insert(&self, config: StaticPathConfig) -> Result<bool, HttpError> {
        match self.mounts.entry(config.url_path.clone()) {
            Entry::Occupied(existing) if *existing.get() == config => {
                debug!("Static path {} already registered", config.url_path);
                Ok(false)
            }
            Entry::Occupied(existing) => Err(conflict(&config, existing.get())),
            Entry::Vacant(slot) => {
                info!(
                    "Registered static path {} -> {}",
                    config.url_path,
                    config.path.display()
                );
                slot.insert(config);
                Ok(true)
            }
        }
    }

    /// All mounts, sorted by URL path
    pub fn registered(&self) -> Vec<StaticPathConfig> {
        let mut mounts: Vec<StaticPathConfig> =
            self.mounts.iter().map(|r| r.value().clone()).collect();
        mounts.sort_by(|a, b| a.url_path.cmp(&b.url_path));
        mounts
    }

    /// Find the mount for a request path and the remainder below it
    pub fn resolve(&self, request_path: &str) -> Option<(StaticPathConfig, String)> {
        self.mounts
            .iter()
            .filter_map(|r| {
                let url_path = r.key().trim_end_matches('/');
                let rest = request_path.strip_prefix(url_path)?;
                if rest.is_empty() || rest.starts_with('/') {
                    Some((r.value().clone(), rest.to_string()))
                } else {
                    None
                }
            })
            .max_by_key(|(config, _)| config.url_path.len())
    }

    /// Router serving the registered mounts from its fallback
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .fallback(serve_static)
            .with_state(self.clone())
    }
}

async fn serve_static(State(paths): State<Arc<StaticPaths>>, req: Request) -> Response {
    let Some((mount, rest)) = paths.resolve(req.uri().path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let is_dir = tokio::fs::metadata(&mount.path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let mut response = if is_dir {
        let (mut parts, body) = req.into_parts();
        let path = if rest.is_empty() { "/" } else { rest.as_str() };
        let uri = match parts.uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };
        parts.uri = match uri.parse::<Uri>() {
            Ok(uri) => uri,
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        };
        let req = Request::from_parts(parts, body);
        match ServeDir::new(&mount.path).oneshot(req).await {
            Ok(res) => res.map(Body::new),
            Err(never) => match never {},
        }
    } else if rest.is_empty() {
        match ServeFile::new(&mount.path).oneshot(req).await {
            Ok(res) => res.map(Body::new),
            Err(never) => match never {},
        }
    } else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if mount.cache_headers && response.status().is_success() {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_HEADER_VALUE),
        );
    }
    response
}
