//! Scriptable provisioner for tests and the demo binary.
//!
//! Keeps units in memory and records every call. Outcomes can be queued per
//! method with `prepare_failure` and `prepare_pass`; each call to that method
//! pops the next one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::{App, Unit, UnitStatus};
use crate::ports::{IdGenerator, OutputSink, ProvisionError, Provisioner, ShellConn};

/// A recorded `execute_command` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    pub app: String,
    pub cmd: String,
    pub once: bool,
}

/// A recorded `shell` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSession {
    pub app: String,
    pub width: u16,
    pub height: u16,
}

#[derive(Default)]
struct FakeState {
    provisioned: HashSet<String>,
    units: HashMap<String, Vec<Unit>>,
    next_unit: u64,
    restarts: HashMap<String, u32>,
    starts: HashMap<String, u32>,
    stops: HashMap<String, u32>,
    cnames: HashMap<String, Vec<String>>,
    commands: Vec<ExecutedCommand>,
    registered: Vec<(String, String, serde_json::Value)>,
    shells: Vec<ShellSession>,
    outputs: VecDeque<String>,
    failures: HashMap<&'static str, VecDeque<Option<ProvisionError>>>,
}

impl FakeState {
    fn fail(&mut self, method: &'static str) -> Result<(), ProvisionError> {
        match self.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }

    fn ensure_provisioned(&self, app: &App) -> Result<(), ProvisionError> {
        if self.provisioned.contains(&app.name) {
            Ok(())
        } else {
            Err(ProvisionError::NotProvisioned)
        }
    }
}

/// Shared handle; clones see the same units and call log.
#[derive(Clone)]
pub struct FakeProvisioner {
    state: Arc<Mutex<FakeState>>,
    ids: Arc<dyn IdGenerator>,
}

impl FakeProvisioner {
    /// Unit names are drawn from `ids`.
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            ids,
        }
    }

    /// Queue an error for a call to `method` (e.g. `"add_units"`).
    pub async fn prepare_failure(&self, method: &'static str, err: ProvisionError) {
        let mut state = self.state.lock().await;
        state.failures.entry(method).or_default().push_back(Some(err));
    }

    /// Queue a normal outcome for `method`. Followed by `prepare_failure`, it
    /// aims the failure at the second call.
    pub async fn prepare_pass(&self, method: &'static str) {
        let mut state = self.state.lock().await;
        state.failures.entry(method).or_default().push_back(None);
    }

    /// Queue output for the next `execute_command`.
    pub async fn prepare_output(&self, output: impl Into<String>) {
        self.state.lock().await.outputs.push_back(output.into());
    }

    pub async fn is_provisioned(&self, app: &str) -> bool {
        self.state.lock().await.provisioned.contains(app)
    }

    /// Units of `app` in creation order.
    pub async fn units_of(&self, app: &str) -> Vec<Unit> {
        self.state
            .lock()
            .await
            .units
            .get(app)
            .cloned()
            .unwrap_or_default()
    }

    /// How many times `restart` ran for `app`.
    pub async fn restarts(&self, app: &str) -> u32 {
        self.state.lock().await.restarts.get(app).copied().unwrap_or(0)
    }

    pub async fn starts(&self, app: &str) -> u32 {
        self.state.lock().await.starts.get(app).copied().unwrap_or(0)
    }

    pub async fn stops(&self, app: &str) -> u32 {
        self.state.lock().await.stops.get(app).copied().unwrap_or(0)
    }

    /// Hostnames currently routed to `app`.
    pub async fn cnames(&self, app: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .cnames
            .get(app)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn commands(&self) -> Vec<ExecutedCommand> {
        self.state.lock().await.commands.clone()
    }

    /// `register_unit` calls as (app, unit, data).
    pub async fn registered(&self) -> Vec<(String, String, serde_json::Value)> {
        self.state.lock().await.registered.clone()
    }

    pub async fn shells(&self) -> Vec<ShellSession> {
        self.state.lock().await.shells.clone()
    }

    /// Force every unit of `app` into `status`.
    pub async fn set_all_status(&self, app: &str, status: UnitStatus) {
        let mut state = self.state.lock().await;
        for unit in state.units.entry(app.to_string()).or_default() {
            unit.status = status;
        }
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn provision(&self, app: &App) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("provision")?;
        if !state.provisioned.insert(app.name.clone()) {
            return Err(ProvisionError::Failed("App already provisioned.".into()));
        }
        Ok(())
    }

    async fn destroy(&self, app: &App) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("destroy")?;
        if !state.provisioned.remove(&app.name) {
            return Err(ProvisionError::NotProvisioned);
        }
        state.units.remove(&app.name);
        state.cnames.remove(&app.name);
        Ok(())
    }

    async fn add_units(
        &self,
        app: &App,
        n: u64,
        process: &str,
        _sink: &dyn OutputSink,
    ) -> Result<Vec<Unit>, ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("add_units")?;
        state.ensure_provisioned(app)?;

        let mut created = Vec::new();
        for _ in 0..n {
            state.next_unit += 1;
            let seq = state.next_unit;
            created.push(Unit {
                id: self.ids.generate_unit_id(),
                name: format!("{}-{}", app.name, seq),
                app_name: String::new(),
                process: process.to_string(),
                ip: format!("10.10.10.{}", seq % 255),
                status: UnitStatus::Started,
            });
        }
        state.units.entry(app.name.clone()).or_default().extend(
            created.iter().cloned().map(|mut u| {
                u.app_name = app.name.clone();
                u
            }),
        );
        Ok(created)
    }

    /// Removes the newest `n` units of `process`; an empty process matches
    /// every unit.
    async fn remove_units(&self, app: &App, n: u64, process: &str) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("remove_units")?;
        state.ensure_provisioned(app)?;
        let units = state.units.entry(app.name.clone()).or_default();
        let matches = |u: &Unit| process.is_empty() || u.process == process;
        let available = units.iter().filter(|&u| matches(u)).count();
        let n = usize::try_from(n).unwrap_or(usize::MAX);
        if n > available {
            return Err(ProvisionError::Failed(format!(
                "cannot remove {n} units, app has {available}"
            )));
        }
        let mut left = n;
        for i in (0..units.len()).rev() {
            if left == 0 {
                break;
            }
            if matches(&units[i]) {
                units.remove(i);
                left -= 1;
            }
        }
        Ok(())
    }

    async fn units(&self, app: &App) -> Result<Vec<Unit>, ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("units")?;
        Ok(state.units.get(&app.name).cloned().unwrap_or_default())
    }

    async fn restart(
        &self,
        app: &App,
        _process: &str,
        _sink: &dyn OutputSink,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("restart")?;
        state.ensure_provisioned(app)?;
        *state.restarts.entry(app.name.clone()).or_default() += 1;
        Ok(())
    }

    async fn start(&self, app: &App, _process: &str) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("start")?;
        state.ensure_provisioned(app)?;
        *state.starts.entry(app.name.clone()).or_default() += 1;
        for unit in state.units.entry(app.name.clone()).or_default() {
            unit.status = UnitStatus::Started;
        }
        Ok(())
    }

    async fn stop(&self, app: &App, _process: &str) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("stop")?;
        state.ensure_provisioned(app)?;
        *state.stops.entry(app.name.clone()).or_default() += 1;
        for unit in state.units.entry(app.name.clone()).or_default() {
            unit.status = UnitStatus::Stopped;
        }
        Ok(())
    }

    async fn execute_command(
        &self,
        app: &App,
        cmd: &str,
        sink: &dyn OutputSink,
        once: bool,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("execute_command")?;
        state.ensure_provisioned(app)?;
        state.commands.push(ExecutedCommand {
            app: app.name.clone(),
            cmd: cmd.to_string(),
            once,
        });
        if let Some(output) = state.outputs.pop_front() {
            sink.write_str(&output);
        }
        Ok(())
    }

    async fn addr(&self, app: &App) -> Result<String, ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("addr")?;
        state.ensure_provisioned(app)?;
        Ok(format!("{}.fakerouter.com", app.name))
    }

    async fn set_cname(&self, app: &App, cname: &str) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("set_cname")?;
        state.ensure_provisioned(app)?;
        state
            .cnames
            .entry(app.name.clone())
            .or_default()
            .push(cname.to_string());
        Ok(())
    }

    async fn unset_cname(&self, app: &App, cname: &str) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("unset_cname")?;
        state.ensure_provisioned(app)?;
        if let Some(list) = state.cnames.get_mut(&app.name) {
            list.retain(|c| c != cname);
        }
        Ok(())
    }

    async fn shell(
        &self,
        app: &App,
        conn: &mut dyn ShellConn,
        width: u16,
        height: u16,
    ) -> Result<(), ProvisionError> {
        {
            let mut state = self.state.lock().await;
            state.fail("shell")?;
            state.ensure_provisioned(app)?;
            state.shells.push(ShellSession {
                app: app.name.clone(),
                width,
                height,
            });
        }
        conn.write_all(format!("shell to {} ({width}x{height})\n", app.name).as_bytes())
            .await
            .map_err(|e| ProvisionError::Failed(e.to_string()))?;
        conn.flush()
            .await
            .map_err(|e| ProvisionError::Failed(e.to_string()))
    }

    async fn register_unit(
        &self,
        app: &App,
        unit_name: &str,
        custom_data: serde_json::Value,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("register_unit")?;
        let known = state
            .units
            .get(&app.name)
            .is_some_and(|units| units.iter().any(|u| u.name == unit_name));
        if !known {
            return Err(ProvisionError::UnitNotFound);
        }
        state
            .registered
            .push((app.name.clone(), unit_name.to_string(), custom_data));
        Ok(())
    }

    async fn set_unit_status(
        &self,
        unit: &Unit,
        status: UnitStatus,
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        state.fail("set_unit_status")?;
        let target = state
            .units
            .get_mut(&unit.app_name)
            .and_then(|units| units.iter_mut().find(|u| u.id == unit.id))
            .ok_or(ProvisionError::UnitNotFound)?;
        target.status = status;
        Ok(())
    }
}
