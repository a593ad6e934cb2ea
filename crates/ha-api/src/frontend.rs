//! Frontend serving module
//!
//! Serves the dashboard pages and keeps the list of extra scripts that
//! integrations inject into them. `index.html` is rendered as a Jinja
//! template on every request so newly added scripts show up immediately.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use indexmap::IndexSet;
use minijinja::{context, Environment};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

/// Page served when the frontend build has no index.html
const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="theme-color" content="{{ theme_color }}">
    <title>Home Assistant</title>
  </head>
  <body>
    <home-assistant></home-assistant>
    <script type="module">
      {%- for extra_module in extra_modules %}
      import("{{ extra_module }}");
      {%- endfor %}
    </script>
    <script>
      function _ls(src) {
        var script = document.createElement("script");
        script.src = src;
        document.head.appendChild(script);
      }
      {%- for extra_script in extra_js_es5 %}
      _ls("{{ extra_script }}");
      {%- endfor %}
    </script>
  </body>
</html>
"#;

/// Frontend configuration
#[derive(Debug, Clone)]
pub struct FrontendConfig {
    /// Path to the frontend files (hass_frontend directory)
    pub frontend_path: PathBuf,
    /// Theme color for the frontend
    pub theme_color: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            frontend_path: PathBuf::from("/usr/share/hass_frontend"),
            theme_color: "#18BCF2".to_string(),
        }
    }
}

/// Frontend state: configuration plus injected script URLs
pub struct Frontend {
    config: FrontendConfig,
    extra_modules: RwLock<IndexSet<String>>,
    extra_js_es5: RwLock<IndexSet<String>>,
}

impl Frontend {
    pub fn new(config: FrontendConfig) -> Self {
        Self {
            config,
            extra_modules: RwLock::new(IndexSet::new()),
            extra_js_es5: RwLock::new(IndexSet::new()),
        }
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    fn urls(&self, es5: bool) -> &RwLock<IndexSet<String>> {
        if es5 {
            &self.extra_js_es5
        } else {
            &self.extra_modules
        }
    }

    /// Inject a script into every dashboard page
    ///
    /// `es5 = false` loads it as a module. Adding a URL twice keeps one copy.
    pub fn add_extra_js_url(&self, url: &str, es5: bool) {
        if self.urls(es5).write().insert(url.to_string()) {
            info!("Added extra JS URL: {} (es5: {})", url, es5);
        }
    }

    /// Stop injecting a script; unknown URLs are ignored
    pub fn remove_extra_js_url(&self, url: &str, es5: bool) {
        if self.urls(es5).write().shift_remove(url) {
            info!("Removed extra JS URL: {} (es5: {})", url, es5);
        } else {
            debug!("Extra JS URL {} was not registered", url);
        }
    }

    /// Module scripts, in insertion order
    pub fn extra_module_urls(&self) -> Vec<String> {
        self.extra_modules.read().iter().cloned().collect()
    }

    /// Legacy ES5 scripts, in insertion order
    pub fn extra_js_es5_urls(&self) -> Vec<String> {
        self.extra_js_es5.read().iter().cloned().collect()
    }

    /// Render the dashboard page
    pub async fn render_index(&self) -> Result<String, minijinja::Error> {
        let index_path = self.config.frontend_path.join("index.html");
        let source = match tokio::fs::read_to_string(&index_path).await {
            Ok(source) => source,
            Err(e) => {
                debug!("Using built-in index, failed to read {:?}: {}", index_path, e);
                FALLBACK_INDEX.to_string()
            }
        };

        let env = Environment::new();
        env.render_str(
            &source,
            context! {
                theme_color => &self.config.theme_color,
                extra_modules => self.extra_module_urls(),
                extra_js_es5 => self.extra_js_es5_urls(),
            },
        )
    }

    /// Create frontend router
    pub fn router(self: &Arc<Self>) -> Router {
        let frontend_path = &self.config.frontend_path;

        Router::new()
            .route("/", get(serve_index))
            .route("/lovelace", get(serve_index))
            .route("/lovelace/*path", get(serve_index))
            .nest_service(
                "/frontend_latest",
                ServeDir::new(frontend_path.join("frontend_latest")),
            )
            .nest_service(
                "/frontend_es5",
                ServeDir::new(frontend_path.join("frontend_es5")),
            )
            .nest_service("/static", ServeDir::new(frontend_path.join("static")))
            .with_state(self.clone())
    }
}

/// Serve the main index.html with template processing
async fn serve_index(State(frontend): State<Arc<Frontend>>) -> Response {
    match frontend.render_index().await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!("Failed to render index.html: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
