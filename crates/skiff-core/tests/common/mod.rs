#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use skiff_core::config::CoreConfig;
use skiff_core::domain::{Plan, Team, User};
use skiff_core::impls::{
    FakeProvisioner, InMemoryDirectory, InMemoryLogStore, InMemoryRepositoryManager,
    InMemoryStore, RecordingServiceClient,
};
use skiff_core::ports::{FixedClock, IdGenerator, UlidGenerator};
use skiff_core::{AppManager, CoreBuilder, NewApp};

pub const OWNER: &str = "cobrateam@skiff.io";
pub const TEAM: &str = "cobra";

pub struct Platform {
    pub manager: Arc<AppManager>,
    pub provisioner: FakeProvisioner,
    pub repositories: InMemoryRepositoryManager,
    pub services: RecordingServiceClient,
    pub logs: InMemoryLogStore,
}

impl Platform {
    pub async fn start(config: CoreConfig) -> Self {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 12, 18, 0, 0).unwrap(),
        ));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));

        let directory = InMemoryDirectory::new();
        directory.add_team(Team::new(TEAM, &[OWNER])).await;
        directory.add_team(Team::new("admin", &["root@skiff.io"])).await;
        directory.add_platform("python").await;
        directory.add_plan(Plan::autogenerated(), true).await;

        let store = InMemoryStore::new();
        let logs = InMemoryLogStore::new();
        let provisioner = FakeProvisioner::new(ids.clone());
        let repositories = InMemoryRepositoryManager::new();
        let services = RecordingServiceClient::new();

        let manager = CoreBuilder::new(config)
            .app_store(store.clone())
            .quota_store(store)
            .log_store(logs.clone())
            .provisioner(provisioner.clone())
            .service_client(services.clone())
            .repositories(repositories.clone())
            .directory(directory)
            .clock(clock)
            .id_generator(ids)
            .build()
            .unwrap();

        Self {
            manager: Arc::new(manager),
            provisioner,
            repositories,
            services,
            logs,
        }
    }

    pub async fn default() -> Self {
        Self::start(CoreConfig::default()).await
    }

    pub fn owner(&self) -> User {
        User::new(OWNER)
    }

    pub async fn create(&self, name: &str) {
        self.manager
            .create_app(NewApp::new(name, "python"), &self.owner())
            .await
            .unwrap();
    }
}
