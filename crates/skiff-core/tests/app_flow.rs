mod common;

use skiff_core::config::CoreConfig;
use skiff_core::domain::{BoundInstance, CoreError, EnvVar, ErrorKind, LogFilter, ServiceBindings};
use skiff_core::domain::env::SERVICES_ENV;
use skiff_core::ports::{BufferSink, NullSink, ProvisionError, QuotaSubject};
use skiff_core::NewApp;
use tokio::task::JoinSet;

use common::{OWNER, Platform};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scaling_never_exceeds_the_unit_quota() {
    let config = CoreConfig {
        units_per_app: 5,
        ..CoreConfig::default()
    };
    let p = Platform::start(config).await;
    p.create("america").await;

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let manager = p.manager.clone();
        tasks.spawn(async move { manager.add_units("america", 1, "web", &NullSink).await });
    }
    let mut granted = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => granted += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::QuotaExceeded),
        }
    }

    assert_eq!(granted, 5);
    let quota = p
        .manager
        .ledger()
        .quota(&QuotaSubject::App("america".into()))
        .await
        .unwrap();
    assert_eq!(quota.in_use, 5);
    assert_eq!(p.provisioner.units_of("america").await.len(), 5);
}

#[tokio::test]
async fn lock_is_exclusive_and_reusable() {
    let p = Platform::default().await;
    p.create("myapp").await;
    let m = &p.manager;

    assert!(m.acquire_application_lock("myapp", OWNER, "/deploy").await.unwrap());
    assert!(!m.acquire_application_lock("myapp", "other@skiff.io", "/restart").await.unwrap());
    let shown = m.get("myapp").await.unwrap().lock.to_string();
    assert_eq!(
        shown,
        "App locked by cobrateam@skiff.io, running /deploy. Acquired in 2024-03-12T18:00:00Z"
    );

    m.release_application_lock("myapp").await.unwrap();
    assert!(m.acquire_application_lock("myapp", "other@skiff.io", "/restart").await.unwrap());
}

#[tokio::test]
async fn public_only_never_touches_private_values() {
    let p = Platform::default().await;
    p.create("myapp").await;
    let m = &p.manager;

    m.set_envs(
        "myapp",
        vec![EnvVar::new("DATABASE_HOST", "private.host", false)],
        false,
        false,
        &NullSink,
    )
    .await
    .unwrap();
    m.set_envs(
        "myapp",
        vec![
            EnvVar::new("DATABASE_HOST", "public.host", true),
            EnvVar::new("DATABASE_PORT", "3306", true),
        ],
        true,
        false,
        &NullSink,
    )
    .await
    .unwrap();

    assert_eq!(m.env("myapp", "DATABASE_HOST").await.unwrap().value, "private.host");
    assert_eq!(m.env("myapp", "DATABASE_PORT").await.unwrap().value, "3306");
}

#[tokio::test]
async fn binding_then_unbinding_an_instance_restores_env() {
    let p = Platform::default().await;
    p.create("myapp").await;
    let m = &p.manager;
    let before = m.envs("myapp").await.unwrap();

    let first = BoundInstance::new("db-a", [("DATABASE_HOST", "10.0.0.1")]);
    let second = BoundInstance::new("db-b", [("DATABASE_HOST", "10.0.0.2")]);
    m.add_instance("myapp", "mysql", first.clone(), false, &NullSink)
        .await
        .unwrap();
    m.add_instance("myapp", "mysql", second.clone(), false, &NullSink)
        .await
        .unwrap();

    let env = m.envs("myapp").await.unwrap();
    assert_eq!(env["DATABASE_HOST"].value, "10.0.0.2");
    assert_eq!(
        ServiceBindings::from_env(&env).unwrap().instances("mysql").len(),
        2
    );

    m.remove_instance("myapp", "mysql", &second, false, &NullSink)
        .await
        .unwrap();
    assert_eq!(m.env("myapp", "DATABASE_HOST").await.unwrap().value, "10.0.0.1");

    m.remove_instance("myapp", "mysql", &first, false, &NullSink)
        .await
        .unwrap();
    let after = m.envs("myapp").await.unwrap();
    assert!(!after.contains_key(SERVICES_ENV));
    assert_eq!(after, before);
}

#[tokio::test]
async fn cname_shapes() {
    let p = Platform::default().await;
    p.create("myapp").await;

    let err = p
        .manager
        .add_cname("myapp", &["_bad.host".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid cname");

    p.manager.add_cname("myapp", &[String::new()]).await.unwrap();
    assert!(p.manager.get("myapp").await.unwrap().cname.is_empty());
}

#[tokio::test]
async fn last_logs_returns_the_newest_window_in_order() {
    let p = Platform::default().await;
    p.create("myapp").await;

    for i in 0..15 {
        p.manager
            .log("myapp", &format!("line {i}"), "web", "unit-1")
            .await
            .unwrap();
    }
    let logs = p
        .manager
        .last_logs("myapp", 10, &LogFilter::default())
        .await
        .unwrap();
    let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
    let expected: Vec<String> = (5..15).map(|i| format!("line {i}")).collect();
    assert_eq!(messages, expected);

    assert!(
        p.manager
            .last_logs("nobody", 10, &LogFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn multi_line_messages_become_one_record_per_line() {
    let p = Platform::default().await;
    p.create("myapp").await;

    let written = p
        .manager
        .log("myapp", "first\n\n  \nsecond\r\n", "worker", "unit-2")
        .await
        .unwrap();
    assert_eq!(written, 2);
    let logs = p
        .manager
        .last_logs("myapp", 10, &LogFilter::source("worker"))
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.unit == "unit-2" && l.app_name == "myapp"));
}

#[tokio::test]
async fn listener_sees_new_records_until_closed() {
    let p = Platform::default().await;
    p.create("myapp").await;
    p.manager.log("myapp", "before", "web", "u").await.unwrap();

    let mut listener = p.manager.new_log_listener("myapp", LogFilter::source("web"));
    p.manager.log("myapp", "hello", "web", "u").await.unwrap();
    p.manager.log("myapp", "ignored", "worker", "u").await.unwrap();

    let record = listener.recv().await.unwrap();
    assert_eq!(record.message, "hello");
    assert!(listener.try_recv().is_none());

    listener.close();
    p.manager.log("myapp", "after", "web", "u").await.unwrap();
    assert!(listener.try_recv().is_none());
    assert!(listener.recv().await.is_none());
}

#[tokio::test]
async fn failed_creation_leaves_nothing_behind() {
    let p = Platform::default().await;
    p.provisioner
        .prepare_failure("provision", ProvisionError::Failed("exit status 1".into()))
        .await;

    let err = p
        .manager
        .create_app(NewApp::new("theirapp", "python"), &p.owner())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to create the app \"theirapp\": exit status 1"
    );
    assert!(matches!(p.manager.get("theirapp").await, Err(CoreError::AppNotFound)));
    assert!(!p.repositories.exists("theirapp").await);
}

#[tokio::test]
async fn full_lifecycle() {
    let p = Platform::default().await;
    p.create("myapp").await;
    let m = &p.manager;

    let units = m.add_units("myapp", 2, "web", &NullSink).await.unwrap();
    m.add_instance(
        "myapp",
        "redis",
        BoundInstance::new("cache", [("REDIS_URL", "redis://10.0.0.9")]),
        false,
        &NullSink,
    )
    .await
    .unwrap();
    for unit in &units {
        assert!(m.bind_unit("myapp", unit).await.unwrap().is_ok());
    }
    assert_eq!(p.services.calls().await.len(), 2);

    let sink = BufferSink::new();
    m.restart("myapp", "web", OWNER, &sink).await.unwrap();
    assert_eq!(p.provisioner.restarts("myapp").await, 1);
    m.run("myapp", "python manage.py migrate", true, &NullSink)
        .await
        .unwrap();

    m.record_deploy("myapp").await.unwrap();
    let view = serde_json::to_value(m.get("myapp").await.unwrap().view()).unwrap();
    assert_eq!(view["ready"], true);
    assert_eq!(view["teamowner"], "cobra");
    assert_eq!(view["deploys"], 1);

    m.delete_app("myapp", &NullSink).await.unwrap();
    assert!(m.list(None).await.unwrap().is_empty());
    assert_eq!(p.logs.count("myapp").await, 0);
    let owner = m
        .ledger()
        .quota(&QuotaSubject::Owner(OWNER.into()))
        .await
        .unwrap();
    assert_eq!(owner.in_use, 0);
}
