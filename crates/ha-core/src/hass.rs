//! The central Home Assistant instance

use std::sync::Arc;

use axum::Router;
use dashmap::DashSet;
use ha_api::{Frontend, FrontendConfig, StaticPaths};
use ha_config::{ConfigType, CoreConfig};
use ha_config_entries::{ConfigEntries, FlowResult};
use tracing::{debug, error, info};

use crate::data::DataRegistry;
use crate::integration::{Integration, IntegrationEntryHandler, IntegrationResult};
use crate::tasks::TaskTracker;

/// Host services shared with integrations
pub struct HomeAssistant {
    /// Core configuration
    pub config: Arc<CoreConfig>,
    /// Per-domain shared data
    pub data: Arc<DataRegistry>,
    /// Static path registrar
    pub http: Arc<StaticPaths>,
    /// Frontend and injected scripts
    pub frontend: Arc<Frontend>,
    /// Config entries manager
    pub config_entries: Arc<ConfigEntries>,
    /// Background tasks
    pub tasks: Arc<TaskTracker>,
    components: DashSet<String>,
}

impl HomeAssistant {
    /// Create a new Home Assistant instance
    ///
    /// Config entries are persisted under the config directory's `.storage`.
    pub fn new(config: CoreConfig) -> Self {
        let frontend = Frontend::new(FrontendConfig {
            frontend_path: config.frontend_path.clone(),
            theme_color: config.theme_color.clone(),
        });
        let config_entries = ConfigEntries::new(&config.config_dir);

        Self {
            config: Arc::new(config),
            data: Arc::new(DataRegistry::new()),
            http: Arc::new(StaticPaths::new()),
            frontend: Arc::new(frontend),
            config_entries: Arc::new(config_entries),
            tasks: Arc::new(TaskTracker::new()),
            components: DashSet::new(),
        }
    }

    /// Set up an integration
    ///
    /// Registers its entry hooks, then runs its component-level setup. The
    /// hooks are dropped again if setup fails, so stored entries of a
    /// component that did not load stay unloaded. A component that is
    /// already loaded is not set up again.
    pub async fn setup_component(
        &self,
        integration: Arc<dyn Integration>,
        config: &ConfigType,
    ) -> IntegrationResult<bool> {
        let domain = integration.domain().to_string();
        if self.components.contains(&domain) {
            debug!("Component {} already set up", domain);
            return Ok(true);
        }

        self.config_entries
            .register_handler(&domain, Arc::new(IntegrationEntryHandler(integration.clone())));

        match integration.setup(self, config).await {
            Ok(true) => {
                self.components.insert(domain.clone());
                info!("Setup of domain {} took effect", domain);
                Ok(true)
            }
            Ok(false) => {
                self.config_entries.unregister_handler(&domain);
                error!("Setup failed for {}: integration reported failure", domain);
                Ok(false)
            }
            Err(e) => {
                self.config_entries.unregister_handler(&domain);
                Err(e)
            }
        }
    }

    /// Domains of loaded components, sorted
    pub fn components(&self) -> Vec<String> {
        let mut components: Vec<String> = self.components.iter().map(|d| d.key().clone()).collect();
        components.sort();
        components
    }

    /// Schedule an import config flow for `domain`
    pub fn create_import_flow(&self, domain: &str, data: serde_json::Value) {
        let entries = self.config_entries.clone();
        let domain = domain.to_string();

        self.tasks
            .create_task(format!("import flow {}", domain), async move {
                match entries.flow_init_import(&domain, data).await {
                    Ok(FlowResult::CreateEntry { entry_id, .. }) => {
                        debug!("Import flow for {} created entry {}", domain, entry_id)
                    }
                    Ok(FlowResult::Abort { reason, .. }) => {
                        debug!("Import flow for {} aborted: {}", domain, reason)
                    }
                    Err(e) => error!("Import flow for {} failed: {}", domain, e),
                }
            });
    }

    /// HTTP router for the frontend and registered static paths
    pub fn router(&self) -> Router {
        ha_api::create_router(&self.frontend, &self.http)
    }

    /// Wait for all scheduled tasks
    pub async fn block_till_done(&self) {
        self.tasks.block_till_done().await;
    }
}
