//! Team access, custom hostnames and visibility.

use tracing::{error, info};

use crate::app::manager::AppManager;
use crate::domain::cname::{self, INVALID_CNAME};
use crate::domain::{App, CoreError, User};

impl AppManager {
    /// Give `team` access to the app.
    pub async fn grant(&self, app: &str, team: &str) -> Result<(), CoreError> {
        if self.directory.find_team(team).await?.is_none() {
            return Err(CoreError::TeamNotFound);
        }
        if !self.apps.add_team(app, team).await? {
            return Err(CoreError::TeamAlreadyHasAccess);
        }
        info!(app, team, "team granted access");
        Ok(())
    }

    pub async fn revoke(&self, app: &str, team: &str) -> Result<(), CoreError> {
        if !self.apps.remove_team(app, team).await? {
            return Err(CoreError::TeamHasNoAccess);
        }
        info!(app, team, "team access revoked");
        Ok(())
    }

    /// Route extra hostnames to the app. Names are checked for shape and
    /// global uniqueness before anything is routed; a routing or storage
    /// failure unroutes what this call already set.
    pub async fn add_cname(&self, app: &str, names: &[String]) -> Result<(), CoreError> {
        if names.iter().any(|n| !cname::is_valid(n)) {
            return Err(CoreError::validation(INVALID_CNAME));
        }
        let names: Vec<String> = names.iter().filter(|n| !n.is_empty()).cloned().collect();
        if names.is_empty() {
            return Ok(());
        }
        let snapshot = self.get(app).await?;
        let taken = self
            .apps
            .list()
            .await?
            .iter()
            .any(|other| other.cname.iter().any(|c| names.contains(c)));
        if taken {
            return Err(CoreError::CNameExists);
        }

        let mut routed = Vec::with_capacity(names.len());
        for name in &names {
            if let Err(err) = self.provisioner.set_cname(&snapshot, name).await {
                self.unroute(&snapshot, &routed).await;
                return Err(err.into());
            }
            routed.push(name.clone());
        }
        if let Err(err) = self.apps.add_cnames(app, &names).await {
            self.unroute(&snapshot, &routed).await;
            return Err(err.into());
        }
        info!(app, cnames = ?names, "cnames added");
        Ok(())
    }

    /// Unroute and forget hostnames. Every name must currently belong to the
    /// app; a routing or storage failure routes back what this call already
    /// unset, so route table and record stay in agreement.
    pub async fn remove_cname(&self, app: &str, names: &[String]) -> Result<(), CoreError> {
        let snapshot = self.get(app).await?;
        if names.iter().any(|n| !snapshot.cname.contains(n)) {
            return Err(CoreError::CNameNotFound);
        }
        let mut unrouted = Vec::with_capacity(names.len());
        for name in names {
            if let Err(err) = self.provisioner.unset_cname(&snapshot, name).await {
                self.reroute(&snapshot, &unrouted).await;
                return Err(err.into());
            }
            unrouted.push(name.clone());
        }
        if let Err(err) = self.apps.remove_cnames(app, names).await {
            self.reroute(&snapshot, &unrouted).await;
            return Err(err.into());
        }
        info!(app, cnames = ?names, "cnames removed");
        Ok(())
    }

    /// Apps visible to `user`: those sharing a team with them. Admins and
    /// `None` see everything.
    pub async fn list(&self, user: Option<&User>) -> Result<Vec<App>, CoreError> {
        let apps = self.apps.list().await?;
        let Some(user) = user else {
            return Ok(apps);
        };
        let teams = self.user_teams(user).await?;
        if self.is_admin(&teams) {
            return Ok(apps);
        }
        Ok(apps
            .into_iter()
            .filter(|app| teams.iter().any(|t| app.has_team(&t.name)))
            .collect())
    }

    async fn reroute(&self, app: &App, names: &[String]) {
        for name in names {
            if let Err(err) = self.provisioner.set_cname(app, name).await {
                error!(app = %app.name, cname = %name, error = %err, "failed to restore cname route");
            }
        }
    }

    async fn unroute(&self, app: &App, names: &[String]) {
        for name in names.iter().rev() {
            if let Err(err) = self.provisioner.unset_cname(app, name).await {
                error!(app = %app.name, cname = %name, error = %err, "failed to roll back cname");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::app::testing::{Harness, TEAM};
    use crate::domain::{CoreError, ErrorKind, Team, User};
    use crate::ports::ProvisionError;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn grant_and_revoke_keep_teams_sorted() {
        let h = Harness::with_app("myapp").await;
        h.directory.add_team(Team::new("avengers", &[])).await;

        h.manager.grant("myapp", "avengers").await.unwrap();
        assert_eq!(h.manager.get("myapp").await.unwrap().teams, vec!["avengers", TEAM]);

        let err = h.manager.grant("myapp", "avengers").await.unwrap_err();
        assert_eq!(err.to_string(), "This team already has access to this app");

        h.manager.revoke("myapp", "avengers").await.unwrap();
        let err = h.manager.revoke("myapp", "avengers").await.unwrap_err();
        assert_eq!(err.to_string(), "This team does not have access to this app");
    }

    #[tokio::test]
    async fn grant_needs_a_known_team() {
        let h = Harness::with_app("myapp").await;
        let err = h.manager.grant("myapp", "ghosts").await.unwrap_err();
        assert!(matches!(err, CoreError::TeamNotFound));
    }

    #[tokio::test]
    async fn add_cname_routes_and_persists() {
        let h = Harness::with_app("myapp").await;
        h.manager
            .add_cname("myapp", &names(&["ktulu.mycompany.com", "*.myapp.io"]))
            .await
            .unwrap();

        assert_eq!(
            h.manager.get("myapp").await.unwrap().cname,
            vec!["ktulu.mycompany.com", "*.myapp.io"]
        );
        assert_eq!(h.provisioner.cnames("myapp").await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_cname_changes_nothing() {
        let h = Harness::with_app("myapp").await;
        let err = h
            .manager
            .add_cname("myapp", &names(&["ok.example.com", "_bad.host"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid cname");
        assert!(h.provisioner.cnames("myapp").await.is_empty());
    }

    #[tokio::test]
    async fn empty_cname_is_a_no_op() {
        let h = Harness::with_app("myapp").await;
        h.manager.add_cname("myapp", &names(&[""])).await.unwrap();
        assert!(h.manager.get("myapp").await.unwrap().cname.is_empty());
        assert!(h.provisioner.cnames("myapp").await.is_empty());
    }

    #[tokio::test]
    async fn cnames_are_unique_across_apps() {
        let h = Harness::with_app("myapp").await;
        h.insert_app("other", crate::domain::Quota::unlimited()).await;
        h.manager
            .add_cname("myapp", &names(&["shared.example.com"]))
            .await
            .unwrap();

        let err = h
            .manager
            .add_cname("other", &names(&["shared.example.com"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cname already exists!");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(h.provisioner.cnames("other").await.is_empty());
    }

    #[tokio::test]
    async fn routing_failure_persists_nothing() {
        let h = Harness::with_app("myapp").await;
        h.provisioner
            .prepare_failure("set_cname", ProvisionError::Failed("router down".into()))
            .await;
        h.manager
            .add_cname("myapp", &names(&["a.example.com"]))
            .await
            .unwrap_err();
        assert!(h.provisioner.cnames("myapp").await.is_empty());
        assert!(h.manager.get("myapp").await.unwrap().cname.is_empty());
    }

    #[tokio::test]
    async fn partial_routing_failure_unroutes_earlier_names() {
        let h = Harness::with_app("myapp").await;
        h.provisioner.prepare_pass("set_cname").await;
        h.provisioner
            .prepare_failure("set_cname", ProvisionError::Failed("router down".into()))
            .await;

        h.manager
            .add_cname("myapp", &names(&["a.example.com", "b.example.com"]))
            .await
            .unwrap_err();
        assert!(h.provisioner.cnames("myapp").await.is_empty());
        assert!(h.manager.get("myapp").await.unwrap().cname.is_empty());
    }

    #[tokio::test]
    async fn failed_unroute_restores_earlier_routes() {
        let h = Harness::with_app("myapp").await;
        let both = names(&["a.example.com", "b.example.com"]);
        h.manager.add_cname("myapp", &both).await.unwrap();
        h.provisioner.prepare_pass("unset_cname").await;
        h.provisioner
            .prepare_failure("unset_cname", ProvisionError::Failed("router down".into()))
            .await;

        let err = h.manager.remove_cname("myapp", &both).await.unwrap_err();
        assert_eq!(err.to_string(), "router down");
        assert_eq!(h.manager.get("myapp").await.unwrap().cname, both);
        let mut routed = h.provisioner.cnames("myapp").await;
        routed.sort();
        assert_eq!(routed, both);
    }

    #[tokio::test]
    async fn remove_cname_requires_ownership() {
        let h = Harness::with_app("myapp").await;
        h.manager
            .add_cname("myapp", &names(&["a.example.com", "b.example.com"]))
            .await
            .unwrap();

        let err = h
            .manager
            .remove_cname("myapp", &names(&["c.example.com"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "cname not exists!");

        h.manager
            .remove_cname("myapp", &names(&["a.example.com"]))
            .await
            .unwrap();
        assert_eq!(h.manager.get("myapp").await.unwrap().cname, vec!["b.example.com"]);
        assert_eq!(h.provisioner.cnames("myapp").await, vec!["b.example.com"]);
    }

    #[tokio::test]
    async fn list_filters_by_team() {
        let h = Harness::with_app("myapp").await;
        let mut hidden = crate::domain::App::new("hidden", "python");
        hidden.teams = vec!["elsewhere".into()];
        crate::ports::AppStore::insert(&h.store, hidden).await.unwrap();

        let visible = h.manager.list(Some(&h.user())).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "myapp");

        let root = User::new("root@skiff.io");
        assert_eq!(h.manager.list(Some(&root)).await.unwrap().len(), 2);
        assert_eq!(h.manager.list(None).await.unwrap().len(), 2);
        assert!(
            h.manager
                .list(Some(&User::new("nobody@skiff.io")))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
