use crate::{
    config::Config,
    gateway::{
        self,
        CredentialStore,
    },
    notify::Notifier,
    relay::Relay,
};
use anyhow::Result;
use futures::future::try_join_all;
use log::warn;
use std::{
    net::IpAddr,
    sync::Arc,
};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
};

/// Owns the loaded configuration and wires the gateway and relay listeners
/// together.
pub struct ProxyRuntime {
    config: Arc<Config>,
    store: Arc<CredentialStore>,
    notifier: Arc<Notifier>,
}

impl ProxyRuntime {
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(CredentialStore::new(config.pending_ttl()));
        let notifier = Arc::new(Notifier::new(
            config.agent_notify_port,
            config.agent_notify_token.clone(),
            config.notify_timeout(),
        )?);

        Ok(Self {
            config: Arc::new(config),
            store,
            notifier,
        })
    }

    /// Binds everything on `address` and serves until a listener fails.
    pub async fn run(self, address: IpAddr) -> Result<()> {
        let mut tasks = Vec::new();

        let gateway_listener =
            TcpListener::bind((address, self.config.local_http_port)).await?;
        tasks.push(tokio::spawn(gateway::run(
            gateway_listener,
            self.store.clone(),
            self.config.local_proxy_token.clone(),
        )));

        for (port, listener_config) in &self.config.listeners {
            let port: u16 = match port.parse() {
                Ok(port) => port,
                Err(_) => {
                    warn!("ignoring listener with non-numeric port {port:?}");
                    continue;
                }
            };

            let listener = TcpListener::bind((address, port)).await?;
            let relay = Relay::new(
                listener_config,
                self.config.clone(),
                self.store.clone(),
                self.notifier.clone(),
            );
            tasks.push(tokio::spawn(relay.run(listener)));
        }

        join_tasks(tasks).await
    }
}

/// Waits on every listener task, failing as soon as any one of them fails.
///
/// The handles resolve to `Result<Result<()>, JoinError>`; both layers are
/// flattened here so a listener returning an error terminates the process
/// instead of being held until its siblings finish, which they never do.
async fn join_tasks(tasks: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    try_join_all(tasks.into_iter().map(|handle| async move { handle.await? })).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn a_failed_listener_fails_the_join_while_siblings_still_run() {
        let tasks = vec![
            tokio::spawn(async {
                futures::future::pending::<()>().await;
                Ok(())
            }),
            tokio::spawn(async { bail!("listener died") }),
        ];

        let err = timeout(Duration::from_secs(5), join_tasks(tasks))
            .await
            .expect("join must not wait on the healthy sibling")
            .unwrap_err();
        assert!(err.to_string().contains("listener died"));
    }

    #[tokio::test]
    async fn a_panicked_listener_fails_the_join() {
        let tasks = vec![
            tokio::spawn(async {
                futures::future::pending::<()>().await;
                Ok(())
            }),
            tokio::spawn(async { panic!("boom") }),
        ];

        let result = timeout(Duration::from_secs(5), join_tasks(tasks))
            .await
            .expect("join must not wait on the healthy sibling");
        assert!(result.is_err());
    }
}
