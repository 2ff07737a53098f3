//! Log pipeline: persist, then fan out to live listeners.
//!
//! Writes for one app pass through a per-app async gate, so the order
//! records are persisted in is the order every listener sees them. Fan-out
//! never blocks: each listener owns a bounded channel and a full channel
//! loses that record for that listener only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::app::manager::AppManager;
use crate::domain::applog::split_lines;
use crate::domain::{Applog, CoreError, LogFilter};
use crate::ports::{Clock, IdGenerator, LogStore};

struct Subscriber {
    id: u64,
    filter: LogFilter,
    tx: mpsc::Sender<Applog>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_app: HashMap<String, Vec<Subscriber>>,
}

impl Registry {
    fn remove(&mut self, app: &str, id: u64) {
        if let Some(subs) = self.by_app.get_mut(app) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                self.by_app.remove(app);
            }
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct LogPipeline {
    store: Arc<dyn LogStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    buffer: usize,
    registry: Arc<Mutex<Registry>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LogPipeline {
    pub fn new(
        store: Arc<dyn LogStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        buffer: usize,
    ) -> Self {
        Self {
            store,
            ids,
            clock,
            buffer: buffer.max(1),
            registry: Arc::new(Mutex::new(Registry::default())),
            gates: Mutex::new(HashMap::new()),
        }
    }

    fn gate(&self, app: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        gates.entry(app.to_string()).or_default().clone()
    }

    /// Drop the gate once no other writer holds or waits on it. New writers
    /// clone under the same map lock, so the count cannot grow meanwhile.
    fn release_gate(&self, app: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut gates = self.gates.lock().unwrap_or_else(|e| e.into_inner());
        if Arc::strong_count(&gate) == 2
            && gates.get(app).is_some_and(|held| Arc::ptr_eq(held, &gate))
        {
            gates.remove(app);
        }
    }

    /// Open write gates, for tests.
    #[cfg(test)]
    pub(crate) fn gate_count(&self) -> usize {
        self.gates.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Persist one record per non-blank line of `message`, then deliver them
    /// to matching listeners. Returns how many records were written.
    pub async fn log(
        &self,
        app: &str,
        message: &str,
        source: &str,
        unit: &str,
    ) -> Result<usize, CoreError> {
        let lines: Vec<&str> = split_lines(message).collect();
        if lines.is_empty() {
            return Ok(0);
        }

        let gate = self.gate(app);
        let written = {
            let _turn = gate.lock().await;
            self.write(app, lines, source, unit).await
        };
        self.release_gate(app, gate);
        written
    }

    async fn write(
        &self,
        app: &str,
        lines: Vec<&str>,
        source: &str,
        unit: &str,
    ) -> Result<usize, CoreError> {
        let date = self.clock.now();
        let records: Vec<Applog> = lines
            .into_iter()
            .map(|line| Applog {
                id: self.ids.generate_log_id(),
                date,
                message: line.to_string(),
                source: source.to_string(),
                app_name: app.to_string(),
                unit: unit.to_string(),
            })
            .collect();
        let count = records.len();

        self.store.append(app, records.clone()).await?;
        self.fan_out(app, &records);
        Ok(count)
    }

    fn fan_out(&self, app: &str, records: &[Applog]) {
        let mut registry = lock(&self.registry);
        let Some(subs) = registry.by_app.get_mut(app) else {
            return;
        };
        subs.retain(|sub| {
            for record in records.iter().filter(|r| sub.filter.matches(r)) {
                match sub.tx.try_send(record.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(app, listener = sub.id, "log listener is full, dropping record");
                    }
                    Err(TrySendError::Closed(_)) => return false,
                }
            }
            true
        });
        if subs.is_empty() {
            registry.by_app.remove(app);
        }
    }

    /// Up to `n` most recent matching records, oldest first.
    pub async fn last_logs(
        &self,
        app: &str,
        n: usize,
        filter: &LogFilter,
    ) -> Result<Vec<Applog>, CoreError> {
        Ok(self.store.last(app, n, filter).await?)
    }

    /// Subscribe to records written from now on.
    pub fn new_log_listener(&self, app: &str, filter: LogFilter) -> LogListener {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .by_app
            .entry(app.to_string())
            .or_default()
            .push(Subscriber { id, filter, tx });
        LogListener {
            id,
            app: app.to_string(),
            rx,
            registry: Arc::downgrade(&self.registry),
            closed: false,
        }
    }

    pub fn listener_count(&self, app: &str) -> usize {
        lock(&self.registry).by_app.get(app).map_or(0, Vec::len)
    }

    /// Drop every stored record and the write gate for `app`.
    pub async fn forget(&self, app: &str) -> Result<(), CoreError> {
        self.store.remove_all(app).await?;
        self.gates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(app);
        Ok(())
    }
}

/// Live subscription to one app's log stream.
pub struct LogListener {
    id: u64,
    app: String,
    rx: mpsc::Receiver<Applog>,
    registry: Weak<Mutex<Registry>>,
    closed: bool,
}

impl LogListener {
    /// Next matching record. `None` once closed.
    pub async fn recv(&mut self) -> Option<Applog> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Applog> {
        if self.closed {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stop the subscription. Records still buffered are discarded and
    /// nothing is delivered after this returns.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.app, self.id);
        }
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for LogListener {
    fn drop(&mut self) {
        self.close();
    }
}

// ========================================
// AppManager surface
// ========================================

impl AppManager {
    pub async fn log(
        &self,
        app: &str,
        message: &str,
        source: &str,
        unit: &str,
    ) -> Result<usize, CoreError> {
        self.logs.log(app, message, source, unit).await
    }

    pub async fn last_logs(
        &self,
        app: &str,
        n: usize,
        filter: &LogFilter,
    ) -> Result<Vec<Applog>, CoreError> {
        self.logs.last_logs(app, n, filter).await
    }

    pub fn new_log_listener(&self, app: &str, filter: LogFilter) -> LogListener {
        self.logs.new_log_listener(app, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryLogStore;
    use crate::ports::{SystemClock, UlidGenerator};

    fn pipeline(buffer: usize) -> (LogPipeline, InMemoryLogStore) {
        let store = InMemoryLogStore::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        (
            LogPipeline::new(Arc::new(store.clone()), ids, clock, buffer),
            store,
        )
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (logs, store) = pipeline(10);
        assert_eq!(logs.log("app", "a\n\nb", "src", "u").await.unwrap(), 2);
        assert_eq!(logs.log("app", "", "", "").await.unwrap(), 0);

        let got = logs.last_logs("app", 10, &LogFilter::default()).await.unwrap();
        let messages: Vec<_> = got.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
        assert_eq!(got[0].source, "src");
        assert_eq!(got[0].unit, "u");
        assert_eq!(store.count("app").await, 2);
    }

    #[tokio::test]
    async fn listener_receives_matching_records_in_order() {
        let (logs, _) = pipeline(10);
        let mut all = logs.new_log_listener("app", LogFilter::default());
        let mut web = logs.new_log_listener("app", LogFilter::source("web"));

        logs.log("app", "one\ntwo", "web", "u1").await.unwrap();
        logs.log("app", "three", "worker", "u1").await.unwrap();
        logs.log("other", "elsewhere", "web", "u1").await.unwrap();

        let mut seen = Vec::new();
        while let Some(rec) = all.try_recv() {
            seen.push(rec.message);
        }
        assert_eq!(seen, vec!["one", "two", "three"]);

        assert_eq!(web.recv().await.unwrap().message, "one");
        assert_eq!(web.recv().await.unwrap().message, "two");
        assert!(web.try_recv().is_none());
    }

    #[tokio::test]
    async fn full_listener_drops_without_blocking_writer() {
        let (logs, _) = pipeline(2);
        let mut slow = logs.new_log_listener("app", LogFilter::default());

        logs.log("app", "1\n2\n3\n4", "s", "u").await.unwrap();

        assert_eq!(slow.try_recv().unwrap().message, "1");
        assert_eq!(slow.try_recv().unwrap().message, "2");
        assert!(slow.try_recv().is_none());
        assert_eq!(
            logs.last_logs("app", 10, &LogFilter::default())
                .await
                .unwrap()
                .len(),
            4
        );
    }

    #[tokio::test]
    async fn close_stops_delivery_and_deregisters() {
        let (logs, _) = pipeline(10);
        let mut listener = logs.new_log_listener("app", LogFilter::default());
        logs.log("app", "before", "s", "u").await.unwrap();

        listener.close();
        assert_eq!(logs.listener_count("app"), 0);
        logs.log("app", "after", "s", "u").await.unwrap();

        assert!(listener.try_recv().is_none());
        assert!(listener.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_listener_deregisters() {
        let (logs, _) = pipeline(10);
        let listener = logs.new_log_listener("app", LogFilter::default());
        assert_eq!(logs.listener_count("app"), 1);
        drop(listener);
        assert_eq!(logs.listener_count("app"), 0);
    }

    #[tokio::test]
    async fn write_gates_do_not_outlive_their_writers() {
        let (logs, store) = pipeline(10);
        for i in 0..20 {
            logs.log(&format!("ghost-{i}"), "line", "s", "u").await.unwrap();
        }
        assert_eq!(logs.gate_count(), 0);

        let (a, b) = tokio::join!(
            logs.log("app", "one", "s", "u"),
            logs.log("app", "two", "s", "u")
        );
        assert_eq!(a.unwrap() + b.unwrap(), 2);
        assert_eq!(store.count("app").await, 2);
        assert_eq!(logs.gate_count(), 0);
    }
}
