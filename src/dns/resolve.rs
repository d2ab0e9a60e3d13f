//! Platform resolver lookups for the startup diagnostic and for locating
//! the primary server.

use std::net::SocketAddr;

use tokio::net::lookup_host;
use tracing::{debug, info, warn};

use crate::error::SyncError;

/// Forward lookup with the platform resolver. Never fails; a miss is
/// logged and reported as `false`.
pub async fn can_resolve(hostname: &str) -> bool {
    debug!(host = %hostname, "checking name resolution");
    match resolve(hostname, 0).await {
        Ok(addrs) => {
            info!(host = %hostname, addr = %addrs[0].ip(), "name resolves");
            true
        }
        Err(err) => {
            warn!(host = %hostname, error = %err, "name does not resolve");
            false
        }
    }
}

/// All socket addresses for `host:port`. Literal IP addresses skip the
/// resolver.
pub async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, SyncError> {
    let host = host.trim_end_matches('.');
    let failure = |cause: String| SyncError::ResolutionFailure {
        host: host.to_string(),
        cause,
    };

    let addrs = lookup_host((host, port))
        .await
        .map_err(|e| failure(e.to_string()))?
        .collect::<Vec<_>>();
    if addrs.is_empty() {
        return Err(failure("no addresses".into()));
    }
    Ok(addrs)
}

/// First usable address of the primary server.
pub async fn server_addr(host: &str, port: u16) -> Result<SocketAddr, SyncError> {
    Ok(resolve(host, port).await?[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_addresses_resolve() {
        assert!(can_resolve("127.0.0.1").await);
        let addr = server_addr("127.0.0.1", 5353).await.unwrap();
        assert_eq!(addr, "127.0.0.1:5353".parse().unwrap());
    }

    #[tokio::test]
    async fn unresolvable_names_report_false() {
        assert!(!can_resolve("does-not-exist.invalid").await);
        let err = resolve("does-not-exist.invalid", 53).await.unwrap_err();
        assert!(matches!(err, SyncError::ResolutionFailure { .. }));
    }
}
