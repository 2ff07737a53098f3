//! Environment variables and the service-binding aggregate.
//!
//! The binding aggregate is a derived cache: a map from service name to the
//! instances bound to the app, serialized into the reserved `SKIFF_SERVICES`
//! variable. Every function here takes the current env map and returns the
//! next one, so callers can persist the result in a single conditional write.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved variable holding the serialized binding aggregate.
pub const SERVICES_ENV: &str = "SKIFF_SERVICES";

pub type EnvMap = BTreeMap<String, EnvVar>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    pub public: bool,
    /// Empty for directly-set variables.
    #[serde(default, rename = "instanceName", skip_serializing_if = "String::is_empty")]
    pub instance_name: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>, public: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            public,
            instance_name: String::new(),
        }
    }

    pub fn from_instance(
        name: impl Into<String>,
        value: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            public: false,
            instance_name: instance.into(),
        }
    }
}

/// One bound service instance and the variables it contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundInstance {
    #[serde(rename = "instance_name")]
    pub name: String,
    #[serde(default)]
    pub envs: BTreeMap<String, String>,
}

impl BoundInstance {
    pub fn new<I, K, V>(name: impl Into<String>, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            envs: envs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceBindings(pub BTreeMap<String, Vec<BoundInstance>>);

impl ServiceBindings {
    /// Decode the aggregate from an env map. A missing variable is an empty
    /// aggregate.
    pub fn from_env(env: &EnvMap) -> Result<Self, serde_json::Error> {
        match env.get(SERVICES_ENV) {
            Some(var) if !var.value.is_empty() => serde_json::from_str(&var.value),
            _ => Ok(Self::default()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn instances(&self, service: &str) -> &[BoundInstance] {
        self.0.get(service).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every bound instance, in service-name then binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundInstance)> {
        self.0
            .iter()
            .flat_map(|(service, list)| list.iter().map(move |i| (service.as_str(), i)))
    }

    /// Write the aggregate back into `env`, dropping the variable when empty.
    fn store_into(&self, env: &mut EnvMap) -> Result<(), serde_json::Error> {
        if self.is_empty() {
            env.remove(SERVICES_ENV);
        } else {
            let value = serde_json::to_string(&self.0)?;
            env.insert(
                SERVICES_ENV.to_string(),
                EnvVar::new(SERVICES_ENV, value, false),
            );
        }
        Ok(())
    }
}

// ========================================
// Merge rules
// ========================================

/// Merge `batch` into `current`.
///
/// With `public_only`, an existing private variable survives a same-named
/// entry in the batch.
pub fn merge_envs(current: &EnvMap, batch: &[EnvVar], public_only: bool) -> EnvMap {
    let mut next = current.clone();
    for var in batch {
        if public_only
            && let Some(existing) = next.get(&var.name)
            && !existing.public
        {
            continue;
        }
        next.insert(var.name.clone(), var.clone());
    }
    next
}

/// Remove `names` from `current`, keeping private variables when
/// `public_only` is set.
pub fn unset_envs(current: &EnvMap, names: &[String], public_only: bool) -> EnvMap {
    let mut next = current.clone();
    for name in names {
        if let Some(existing) = next.get(name)
            && (!public_only || existing.public)
        {
            next.remove(name);
        }
    }
    next
}

/// Append `instance` under `service` and flatten its variables.
///
/// An instance key overwrites a directly-set variable of the same name; the
/// direct value is not kept and does not come back on `remove_instance`.
pub fn add_instance(
    current: &EnvMap,
    service: &str,
    instance: &BoundInstance,
) -> Result<EnvMap, serde_json::Error> {
    let mut bindings = ServiceBindings::from_env(current)?;
    bindings
        .0
        .entry(service.to_string())
        .or_default()
        .push(instance.clone());

    let mut next = current.clone();
    for (key, value) in &instance.envs {
        next.insert(
            key.clone(),
            EnvVar::from_instance(key.clone(), value.clone(), instance.name.clone()),
        );
    }
    bindings.store_into(&mut next)?;
    Ok(next)
}

/// Remove the first instance named `instance_name` bound under `service`.
///
/// Returns `None` when nothing matched. Only variables contributed by the
/// removed instance go away; if another still-bound instance provides the
/// same key, its value takes the slot back.
pub fn remove_instance(
    current: &EnvMap,
    service: &str,
    instance_name: &str,
) -> Result<Option<EnvMap>, serde_json::Error> {
    let mut bindings = ServiceBindings::from_env(current)?;
    let Some(list) = bindings.0.get_mut(service) else {
        return Ok(None);
    };
    let Some(pos) = list.iter().position(|i| i.name == instance_name) else {
        return Ok(None);
    };
    let removed = list.remove(pos);
    if list.is_empty() {
        bindings.0.remove(service);
    }

    let mut next = current.clone();
    next.retain(|_, var| var.instance_name != removed.name);

    for key in removed.envs.keys() {
        if next.contains_key(key) {
            continue;
        }
        let mut provider = None;
        for (_, inst) in bindings.iter() {
            if let Some(value) = inst.envs.get(key) {
                provider = Some((inst.name.as_str(), value));
            }
        }
        if let Some((inst, value)) = provider {
            next.insert(
                key.clone(),
                EnvVar::from_instance(key.clone(), value.clone(), inst),
            );
        }
    }

    bindings.store_into(&mut next)?;
    Ok(Some(next))
}

/// Variables contributed by one instance.
pub fn instance_envs(env: &EnvMap, instance_name: &str) -> BTreeMap<String, EnvVar> {
    env.iter()
        .filter(|(_, v)| v.instance_name == instance_name)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
