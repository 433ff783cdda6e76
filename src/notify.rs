use crate::model::PendingCredential;
use anyhow::Result;
use log::{
    debug,
    warn,
};
use reqwest::Client;
use std::time::Duration;

/// Fire-and-forget client for the local cataloging agent.
///
/// Delivery is best-effort: timeouts and non-success responses are logged
/// and dropped, never retried, never surfaced to the relay.
pub struct Notifier {
    client: Client,
    url: String,
    token: String,
}

impl Notifier {
    pub fn new(port: u16, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("http://127.0.0.1:{port}/notify"),
            token,
        })
    }

    pub async fn notify(&self, record: &PendingCredential) {
        let mut request = self.client.post(&self.url).json(record);
        if !self.token.is_empty() {
            request = request.header("x-agent-token", &self.token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("cataloged job for device {}", record.device_ip);
            }
            Ok(response) => {
                warn!("catalog notify returned {}", response.status());
            }
            Err(e) => {
                warn!("catalog notify failed: {e}");
            }
        }
    }
}
