//! Wiring for `AppManager`.
//!
//! Every backend port must be supplied; `build()` fails fast naming the
//! first missing one. Clock and id generation default to wall-clock ULIDs.

use std::sync::Arc;

use crate::app::logs::LogPipeline;
use crate::app::manager::AppManager;
use crate::app::quota::QuotaLedger;
use crate::config::CoreConfig;
use crate::ports::{
    AppStore, Clock, Directory, IdGenerator, LogStore, Provisioner, QuotaStore,
    RepositoryManager, ServiceClient, SystemClock, UlidGenerator,
};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}. Supply it before calling build().")]
    Missing(&'static str),
}

/// # Example
/// ```ignore
/// let manager = CoreBuilder::new(CoreConfig::from_env()?)
///     .app_store(store.clone())
///     .quota_store(store)
///     .log_store(logs)
///     .provisioner(provisioner)
///     .service_client(services)
///     .repositories(repositories)
///     .directory(directory)
///     .build()?;
/// ```
#[derive(Default)]
pub struct CoreBuilder {
    config: CoreConfig,
    apps: Option<Arc<dyn AppStore>>,
    quotas: Option<Arc<dyn QuotaStore>>,
    logs: Option<Arc<dyn LogStore>>,
    provisioner: Option<Arc<dyn Provisioner>>,
    services: Option<Arc<dyn ServiceClient>>,
    repositories: Option<Arc<dyn RepositoryManager>>,
    directory: Option<Arc<dyn Directory>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl CoreBuilder {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn app_store(mut self, store: impl AppStore + 'static) -> Self {
        self.apps = Some(Arc::new(store));
        self
    }

    pub fn quota_store(mut self, store: impl QuotaStore + 'static) -> Self {
        self.quotas = Some(Arc::new(store));
        self
    }

    pub fn log_store(mut self, store: impl LogStore + 'static) -> Self {
        self.logs = Some(Arc::new(store));
        self
    }

    pub fn provisioner(mut self, provisioner: impl Provisioner + 'static) -> Self {
        self.provisioner = Some(Arc::new(provisioner));
        self
    }

    pub fn service_client(mut self, client: impl ServiceClient + 'static) -> Self {
        self.services = Some(Arc::new(client));
        self
    }

    pub fn repositories(mut self, manager: impl RepositoryManager + 'static) -> Self {
        self.repositories = Some(Arc::new(manager));
        self
    }

    pub fn directory(mut self, directory: impl Directory + 'static) -> Self {
        self.directory = Some(Arc::new(directory));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<AppManager, BuildError> {
        let apps = self.apps.ok_or(BuildError::Missing("app store"))?;
        let quotas = self.quotas.ok_or(BuildError::Missing("quota store"))?;
        let log_store = self.logs.ok_or(BuildError::Missing("log store"))?;
        let provisioner = self.provisioner.ok_or(BuildError::Missing("provisioner"))?;
        let services = self
            .services
            .ok_or(BuildError::Missing("service client"))?;
        let repositories = self
            .repositories
            .ok_or(BuildError::Missing("repository manager"))?;
        let directory = self.directory.ok_or(BuildError::Missing("directory"))?;

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids: Arc<dyn IdGenerator> = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));

        let logs = LogPipeline::new(
            log_store,
            ids,
            clock.clone(),
            self.config.log_listener_buffer,
        );
        let ledger = QuotaLedger::new(quotas, self.config.apps_per_user);

        Ok(AppManager {
            apps,
            ledger,
            logs,
            provisioner,
            services,
            repositories,
            directory,
            clock,
            config: self.config,
        })
    }
}
