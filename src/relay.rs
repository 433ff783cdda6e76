use crate::{
    codec::JobCodec,
    config::{
        Config,
        ListenerConfig,
    },
    gateway::CredentialStore,
    inject,
    model::PendingCredential,
    notify::Notifier,
};
use anyhow::{
    Context,
    Result,
};
use log::{
    debug,
    info,
    warn,
};
use std::sync::Arc;
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpListener,
        TcpStream,
    },
    time::timeout,
};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;

/// One raw-port relay, bound to one fixed downstream device.
///
/// Per connection: buffer the whole job, look up pending credentials for the
/// device, apply the device profile's injector, forward to the real printer,
/// then fire the cataloging notification. Jobs are independent; the
/// credential store is the only state shared between connections.
pub struct Relay {
    target_ip: String,
    target_port: u16,
    device_name: String,
    config: Arc<Config>,
    store: Arc<CredentialStore>,
    notifier: Arc<Notifier>,
}

impl Relay {
    pub fn new(
        listener: &ListenerConfig,
        config: Arc<Config>,
        store: Arc<CredentialStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let target_ip = if listener.target_ip.is_empty() {
            config.default_target_ip.clone()
        } else {
            listener.target_ip.clone()
        };
        let target_port = listener.target_port.unwrap_or(config.default_target_port);
        let device_name = listener.device_name.clone().unwrap_or_default();

        Self {
            target_ip,
            target_port,
            device_name,
            config,
            store,
            notifier,
        }
    }

    /// Accepts connections forever, one task per connection.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        info!(
            "relaying {} -> {}:{}",
            listener.local_addr()?,
            self.target_ip,
            self.target_port
        );

        let relay = Arc::new(self);
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let relay = relay.clone();
            tokio::spawn(async move {
                if let Err(e) = relay.process(stream).await {
                    warn!("failed to relay job from {peer_addr}; error = {e}");
                }
            });
        }
    }

    async fn process(&self, stream: TcpStream) -> Result<()> {
        let peer_addr = stream.peer_addr()?;
        let job = self.buffer(stream).await?;
        info!(
            "got raw job from {peer_addr} [size={}] for {}:{}",
            job.len(),
            self.target_ip,
            self.target_port
        );

        // Credentials are keyed by the listener's target, preferring the IP
        // dimension. A miss is normal: the job still prints, unattributed.
        let mut pending = self.store.get(&format!("ip:{}", self.target_ip));
        if pending.is_none() && !self.device_name.is_empty() {
            pending = self
                .store
                .get(&format!("name:{}", self.device_name.to_lowercase()));
        }
        let (user, password) = match &pending {
            Some(record) => (
                record.account_username.clone(),
                record.account_password.clone(),
            ),
            None => (String::new(), String::new()),
        };

        let profile = self.config.profile_for(&self.target_ip);
        let injector = inject::select(&profile.injector);
        let payload = injector.transform(&job, &user, &password, &profile);

        // Forwarding is best-effort; cataloging happens either way.
        if let Err(e) = self.forward(&payload).await {
            warn!(
                "failed to forward job to {}:{}; error = {e}",
                self.target_ip, self.target_port
            );
        }

        if let Some(record) = pending {
            // Device identity in the notification comes from the listener's
            // static configuration, not from the push.
            let record = PendingCredential {
                device_name: self.device_name.clone(),
                device_ip: self.target_ip.clone(),
                ..record
            };
            self.notifier.notify(&record).await;
        }

        Ok(())
    }

    /// Reads the whole job into memory.
    ///
    /// The stream ends at peer close, after the read-idle timeout with no new
    /// bytes, or at the size cap. A capped job keeps its first `maxJobBytes`
    /// bytes and the connection is dropped without draining the rest.
    async fn buffer(&self, stream: TcpStream) -> Result<Vec<u8>> {
        let mut framed = Framed::new(stream, JobCodec::new(self.config.max_job_bytes));
        let mut job = Vec::new();

        loop {
            match timeout(self.config.read_idle(), framed.next()).await {
                Ok(Some(Ok(chunk))) => {
                    job.extend_from_slice(&chunk);
                    if framed.codec().truncated() {
                        warn!(
                            "job for {}:{} hit the size cap, truncating",
                            self.target_ip, self.target_port
                        );
                        break;
                    }
                }
                Ok(Some(Err(e))) => return Err(e),
                Ok(None) => break,
                Err(_) => {
                    debug!("read idle timeout, treating job as complete");
                    break;
                }
            }
        }

        Ok(job)
    }

    async fn forward(&self, payload: &[u8]) -> Result<()> {
        let mut stream = timeout(
            self.config.connect_timeout(),
            TcpStream::connect((self.target_ip.as_str(), self.target_port)),
        )
        .await
        .context("connect timed out")??;

        timeout(self.config.connect_timeout(), async {
            stream.write_all(payload).await?;
            stream.shutdown().await
        })
        .await
        .context("write timed out")??;

        debug!(
            "forwarded {} bytes to {}:{}",
            payload.len(),
            self.target_ip,
            self.target_port
        );
        Ok(())
    }
}
