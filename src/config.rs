//! Immutable runtime configuration.

use std::{fmt, net::SocketAddr, time::Duration};

use domain::tsig::Algorithm;

/// Decoded TSIG shared secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct KeySecret(Vec<u8>);

impl KeySecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl fmt::Display for KeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// The zone being mirrored and how to reach its primary.
#[derive(Clone, Debug)]
pub struct ZoneConfig {
    pub domain: String, // "example.com."
    pub server_host: String,
    pub server_port: u16,
    pub key_name: String, // "transfer-key."
    pub key_secret: KeySecret,
    pub key_algorithm: Algorithm,
}

impl ZoneConfig {
    /// Zone apex without trailing dot.
    pub fn domain_root(&self) -> &str {
        self.domain.trim_end_matches('.')
    }

    /// `host:port` for log fields.
    pub fn server_label(&self) -> String {
        if self.server_host.contains(':') {
            format!("[{}]:{}", self.server_host, self.server_port)
        } else {
            format!("{}:{}", self.server_host, self.server_port)
        }
    }
}

/// Cadence and timeouts of the poll loop.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub query_timeout: Duration,
    pub transfer_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}
