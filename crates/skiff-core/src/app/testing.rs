//! Shared fixture for the orchestration unit tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::app::builder::CoreBuilder;
use crate::app::manager::AppManager;
use crate::config::CoreConfig;
use crate::domain::{App, Plan, Quota, Team, User};
use crate::impls::{
    FakeProvisioner, InMemoryDirectory, InMemoryLogStore, InMemoryRepositoryManager,
    InMemoryStore, RecordingServiceClient,
};
use crate::ports::{AppStore, Clock, FixedClock, IdGenerator, Provisioner, UlidGenerator};

pub const OWNER: &str = "whydidifall@thewho.com";
pub const TEAM: &str = "skiffteam";
pub const PLATFORM: &str = "python";

pub struct Harness {
    pub manager: Arc<AppManager>,
    pub store: InMemoryStore,
    pub logs: InMemoryLogStore,
    pub provisioner: FakeProvisioner,
    pub services: RecordingServiceClient,
    pub repositories: InMemoryRepositoryManager,
    pub directory: InMemoryDirectory,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(CoreConfig::default()).await
    }

    pub async fn with_config(config: CoreConfig) -> Self {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(clock.clone()));

        let store = InMemoryStore::new();
        let logs = InMemoryLogStore::new();
        let provisioner = FakeProvisioner::new(ids.clone());
        let services = RecordingServiceClient::new();
        let repositories = InMemoryRepositoryManager::new();
        let directory = InMemoryDirectory::new();

        directory.add_team(Team::new(TEAM, &[OWNER])).await;
        directory.add_team(Team::new("admin", &["root@skiff.io"])).await;
        directory.add_platform(PLATFORM).await;
        directory.add_platform("ruby").await;
        directory
            .add_plan(
                Plan {
                    name: "small".into(),
                    memory: 128,
                    swap: 0,
                    cpu_share: 50,
                },
                true,
            )
            .await;

        let manager = CoreBuilder::new(config)
            .app_store(store.clone())
            .quota_store(store.clone())
            .log_store(logs.clone())
            .provisioner(provisioner.clone())
            .service_client(services.clone())
            .repositories(repositories.clone())
            .directory(directory.clone())
            .clock(clock.clone())
            .id_generator(ids)
            .build()
            .unwrap();

        Self {
            manager: Arc::new(manager),
            store,
            logs,
            provisioner,
            services,
            repositories,
            directory,
            clock,
        }
    }

    /// Harness with one provisioned app owned by `OWNER` and `TEAM`.
    pub async fn with_app(name: &str) -> Self {
        let h = Self::new().await;
        h.insert_app(name, Quota::unlimited()).await;
        h
    }

    pub async fn insert_app(&self, name: &str, quota: Quota) -> App {
        let mut app = App::new(name, PLATFORM);
        app.owner = OWNER.into();
        app.team_owner = TEAM.into();
        app.teams = vec![TEAM.into()];
        app.quota = quota;
        self.store.insert(app.clone()).await.unwrap();
        self.provisioner.provision(&app).await.unwrap();
        app
    }

    pub fn user(&self) -> User {
        User::new(OWNER)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
