use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skiff_core::domain::{App, BoundInstance, EnvVar, LogFilter, Plan, Team, Unit, User};
use skiff_core::impls::{
    FakeProvisioner, InMemoryDirectory, InMemoryLogStore, InMemoryRepositoryManager,
    InMemoryStore,
};
use skiff_core::ports::{
    IdGenerator, OutputSink, ServiceClient, ServiceError, SystemClock, UlidGenerator,
};
use skiff_core::{CoreBuilder, CoreConfig, NewApp};

const OWNER: &str = "ops@skiff.io";
const TEAM: &str = "platform";

/// Progress output goes straight to stdout.
struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_str(&self, s: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(s.as_bytes());
        let _ = out.flush();
    }
}

/// Service endpoint stand-in that only logs the calls it gets.
struct LoggingServiceClient;

#[async_trait]
impl ServiceClient for LoggingServiceClient {
    async fn bind_unit(
        &self,
        service: &str,
        instance: &str,
        app: &App,
        unit: &Unit,
    ) -> Result<(), ServiceError> {
        info!(service, instance, app = %app.name, unit = %unit.name, "bind unit");
        Ok(())
    }

    async fn unbind_unit(
        &self,
        service: &str,
        instance: &str,
        app: &App,
        unit: &Unit,
    ) -> Result<(), ServiceError> {
        info!(service, instance, app = %app.name, unit = %unit.name, "unbind unit");
        Ok(())
    }
}

async fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    directory.add_team(Team::new(TEAM, &[OWNER])).await;
    directory.add_platform("python").await;
    directory
        .add_plan(
            Plan {
                name: "small".into(),
                memory: 256,
                swap: 0,
                cpu_share: 100,
            },
            true,
        )
        .await;
    directory
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CoreConfig::from_env().context("failed to read SKIFF_* configuration")?;
    let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
    let store = InMemoryStore::new();

    let manager = CoreBuilder::new(config)
        .app_store(store.clone())
        .quota_store(store)
        .log_store(InMemoryLogStore::new())
        .provisioner(FakeProvisioner::new(ids.clone()))
        .service_client(LoggingServiceClient)
        .repositories(InMemoryRepositoryManager::new())
        .directory(seeded_directory().await)
        .id_generator(ids)
        .build()
        .context("failed to wire the app manager")?;

    let sink = StdoutSink;
    let user = User::new(OWNER);

    // (A) create and scale
    let app = manager
        .create_app(NewApp::new("demo", "python"), &user)
        .await
        .context("create app")?;
    info!(app = %app.name, ip = %app.ip, "app ready for units");
    let units = manager.add_units("demo", 2, "web", &sink).await?;

    // (B) env and a bound service instance
    manager
        .set_envs(
            "demo",
            vec![EnvVar::new("LOG_LEVEL", "debug", true)],
            false,
            true,
            &sink,
        )
        .await?;
    manager
        .add_instance(
            "demo",
            "mysql",
            BoundInstance::new("demo-db", [("DATABASE_HOST", "10.0.0.5")]),
            false,
            &sink,
        )
        .await?;
    for unit in &units {
        let report = manager.bind_unit("demo", unit).await?;
        info!(unit = %unit.name, ok = report.is_ok(), "unit bound");
    }

    // (C) restart under the app lock while a listener follows the logs
    let mut listener = manager.new_log_listener("demo", LogFilter::default());
    manager.restart("demo", "", OWNER, &sink).await?;
    let unit_name = units.first().map_or("", |u| u.name.as_str());
    manager
        .log("demo", "restart finished\nserving on :8888", "web", unit_name)
        .await?;
    while let Some(record) = listener.try_recv() {
        println!("[{}] {}", record.source, record.message);
    }
    listener.close();

    // (D) routing, then the JSON view
    manager
        .add_cname("demo", &["demo.example.com".to_string()])
        .await?;
    let app = manager.get("demo").await?;
    println!("{}", serde_json::to_string_pretty(&app.view())?);

    // (E) tear down
    manager.delete_app("demo", &sink).await?;
    info!(apps = manager.list(None).await?.len(), "demo finished");
    Ok(())
}
