use crate::model::PendingCredential;
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{
        HeaderMap,
        StatusCode,
    },
    routing::post,
    Router,
};
use log::{
    debug,
    info,
    warn,
};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::{
        Duration,
        Instant,
    },
};
use tokio::net::TcpListener;

struct Entry {
    record: PendingCredential,
    received_at: Instant,
}

/// Short-lived store for out-of-band job credentials.
///
/// The HTTP push path and the relay lookup paths race; a single mutex
/// serializes them so each record is handed to at most one job. Expiry is
/// lazy: every lookup prunes entries older than the TTL, so no background
/// sweeper competes for the lock.
pub struct CredentialStore {
    ttl: Duration,
    pending: Mutex<HashMap<String, Entry>>,
}

impl CredentialStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts the record under each of its device keys, stamped with the
    /// current time. A record with no usable key inserts nothing.
    pub fn put(&self, record: PendingCredential) {
        self.put_at(record, Instant::now());
    }

    fn put_at(&self, record: PendingCredential, received_at: Instant) {
        let mut pending = self.lock();
        for key in record.keys() {
            pending.insert(
                key,
                Entry {
                    record: record.clone(),
                    received_at,
                },
            );
        }
    }

    /// Atomically removes and returns the unexpired record at `key`.
    ///
    /// Consuming a record through one key also removes its sibling key, so a
    /// record pushed with both a device IP and a device name is delivered at
    /// most once overall.
    pub fn get(&self, key: &str) -> Option<PendingCredential> {
        let now = Instant::now();
        let mut pending = self.lock();
        pending.retain(|_, entry| now.duration_since(entry.received_at) <= self.ttl);

        let entry = pending.remove(key)?;
        for sibling in entry.record.keys() {
            pending.remove(&sibling);
        }
        Some(entry.record)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock leaves plain map data behind, which
        // is still safe to use.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Push request body. Every field is optional; the original pusher sends
/// whichever it has.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SetRequest {
    token: String,
    #[serde(rename = "deviceIP")]
    device_ip: String,
    device_name: String,
    account_username: String,
    account_password: String,
    #[serde(rename = "type")]
    print_type: String,
    quantity: u32,
}

#[derive(Clone)]
struct GatewayState {
    store: Arc<CredentialStore>,
    token: String,
}

pub fn router(store: Arc<CredentialStore>, token: String) -> Router {
    Router::new()
        .route("/set", post(handle_set))
        .with_state(GatewayState { store, token })
}

/// Serves the credential ingress on an already-bound listener.
pub async fn run(listener: TcpListener, store: Arc<CredentialStore>, token: String) -> Result<()> {
    info!("credential gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, router(store, token)).await?;
    Ok(())
}

async fn handle_set(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    // The original pusher sometimes sends no body at all; treat that as "{}".
    let request: SetRequest = if body.is_empty() {
        SetRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!("rejecting malformed credential push: {e}");
                return StatusCode::BAD_REQUEST;
            }
        }
    };

    // An empty header is as good as no header; fall back to the body token.
    let presented = headers
        .get("x-proxy-token")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(&request.token);
    // An empty configured secret disables the check entirely.
    if !state.token.is_empty() && presented != state.token {
        warn!("rejecting credential push with bad token");
        return StatusCode::UNAUTHORIZED;
    }

    let record = PendingCredential {
        account_username: request.account_username,
        account_password: request.account_password,
        print_type: request.print_type,
        quantity: request.quantity,
        device_name: request.device_name,
        device_ip: request.device_ip,
    };
    debug!(
        "accepted credential push for device ip={:?} name={:?}",
        record.device_ip, record.device_name
    );
    state.store.put(record);
    StatusCode::OK
}
