use serde::Serialize;

/// Out-of-band accounting metadata for exactly one upcoming job.
///
/// Pushed by a trusted local caller shortly before the job arrives, consumed
/// by at most one relay task. Serializes to the camelCase wire shape the
/// cataloging agent expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCredential {
    pub account_username: String,
    pub account_password: String,
    #[serde(rename = "type")]
    pub print_type: String,
    pub quantity: u32,
    pub device_name: String,
    #[serde(rename = "deviceIP")]
    pub device_ip: String,
}

impl PendingCredential {
    /// Store keys this record is reachable under. A record naming neither a
    /// device IP nor a device name has no keys and cannot be stored.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if !self.device_ip.is_empty() {
            keys.push(format!("ip:{}", self.device_ip));
        }
        if !self.device_name.is_empty() {
            keys.push(format!("name:{}", self.device_name.to_lowercase()));
        }
        keys
    }
}
