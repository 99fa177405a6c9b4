use serde::{Deserialize, Serialize};

/// Public STUN servers used when no explicit ICE configuration is given.
pub const DEFAULT_STUN_ADDRS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:openrelay.metered.ca:80",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl Default for IceServerConfig {
    fn default() -> Self {
        Self {
            urls: DEFAULT_STUN_ADDRS.iter().map(|s| s.to_string()).collect(),
            username: None,
            credential: None,
        }
    }
}
