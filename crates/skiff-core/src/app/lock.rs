//! Application lock.
//!
//! The lock is a field of the app document flipped by conditional updates.
//! There is no expiry: a holder that dies leaves the app locked until
//! someone calls `release_application_lock`.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::manager::AppManager;
use crate::domain::{AppLock, CoreError};
use crate::ports::AppStore;

/// Releases the lock if dropped while still held, which covers panics and
/// cancelled futures. The normal path calls `release`.
struct HeldLock {
    store: Arc<dyn AppStore>,
    app: String,
    armed: bool,
}

impl HeldLock {
    async fn release(mut self) -> Result<(), CoreError> {
        self.armed = false;
        self.store.release_lock(&self.app).await?;
        Ok(())
    }
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let store = self.store.clone();
        let app = std::mem::take(&mut self.app);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = store.release_lock(&app).await {
                        error!(app = %app, error = %err, "failed to release abandoned app lock");
                    }
                });
            }
            Err(_) => error!(app = %app, "app lock abandoned outside a runtime"),
        }
    }
}

impl AppManager {
    /// True if the lock was taken. False, not an error, when the app is
    /// already locked or does not exist.
    pub async fn acquire_application_lock(
        &self,
        app: &str,
        owner: &str,
        reason: &str,
    ) -> Result<bool, CoreError> {
        let lock = AppLock::held_by(owner, reason, self.clock.now());
        let acquired = self.apps.acquire_lock(app, lock).await?;
        if acquired {
            info!(app, owner, reason, "app lock acquired");
        } else {
            warn!(app, owner, reason, "app lock not acquired");
        }
        Ok(acquired)
    }

    /// Idempotent.
    pub async fn release_application_lock(&self, app: &str) -> Result<(), CoreError> {
        self.apps.release_lock(app).await?;
        Ok(())
    }

    /// Run `f` while holding the app lock, releasing it on every exit path.
    pub(crate) async fn with_lock<F, Fut, T>(
        &self,
        app: &str,
        owner: &str,
        reason: &str,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if !self.acquire_application_lock(app, owner, reason).await? {
            let current = self.apps.get(app).await?;
            return Err(CoreError::AppLocked(current.lock.to_string()));
        }
        let held = HeldLock {
            store: self.apps.clone(),
            app: app.to_string(),
            armed: true,
        };

        let result = f().await;
        if let Err(err) = held.release().await {
            error!(app, error = %err, "failed to release app lock");
        }
        result
    }
}
