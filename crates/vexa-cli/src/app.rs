//! Process-wide context shared by all commands.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use vexa_client::{
    paths, ApiClient, AuthGuard, ClientConfig, ClientError, FileSessionStore, SessionState,
};
use vexa_sync::{ActionRunner, NotificationCenter, SyncConfig};

pub(crate) struct App {
    pub(crate) sync: SyncConfig,
    pub(crate) client: ApiClient,
    pub(crate) notifications: NotificationCenter,
    pub(crate) actions: ActionRunner,
}

impl App {
    pub(crate) fn new(api_url: Option<&str>) -> miette::Result<Self> {
        let mut config = ClientConfig::from_env();
        if let Some(url) = api_url {
            config.base_url = url.to_string();
        }
        let sync = SyncConfig::from_env();

        let guard = Arc::new(AuthGuard::new(FileSessionStore::in_dir(
            &config.session_dir,
        )));
        if guard.restore() {
            debug!("Using stored session");
        }

        let client = ApiClient::new(&config, guard)
            .map_err(|e| miette::miette!("Invalid backend URL '{}': {}", config.base_url, e))?;
        let notifications = NotificationCenter::from_config(&sync);
        let actions = ActionRunner::new(
            client.clone(),
            notifications.clone(),
            paths::downloads_dir(),
        );

        Ok(Self {
            sync,
            client,
            notifications,
            actions,
        })
    }

    pub(crate) fn session(&self) -> watch::Receiver<SessionState> {
        self.client.guard().subscribe()
    }
}

/// Turn a failed read into a CLI error.
pub(crate) fn failed(action: &str, error: ClientError) -> miette::Report {
    match error {
        ClientError::AuthExpired => {
            miette::miette!("Session expired. Run `vexa login` to sign in again.")
        }
        ClientError::NotAuthenticated => miette::miette!("Not logged in. Run `vexa login` first."),
        other => miette::miette!("Failed to {}: {}", action, other),
    }
}

/// Resolves once the session is no longer authenticated.
pub(crate) async fn signed_out(mut session: watch::Receiver<SessionState>) {
    let _ = session
        .wait_for(|state| state.session().is_none())
        .await;
}
