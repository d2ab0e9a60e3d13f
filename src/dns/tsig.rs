//! TSIG signing key built from the configured name and secret.

use std::{str::FromStr, sync::Arc};

use domain::tsig::{Algorithm, Key, KeyName};

use crate::{config::ZoneConfig, error::SyncError};

/// Parses a TSIG algorithm name such as `hmac-sha256`.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, SyncError> {
    let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
    Algorithm::from_str(&name).map_err(|_| SyncError::auth(format!("unknown TSIG algorithm '{name}'")))
}

/// Builds the key used to sign transfer requests. The secret is only
/// handed to the HMAC implementation, never formatted.
pub fn signing_key(config: &ZoneConfig) -> Result<Arc<Key>, SyncError> {
    let name = KeyName::from_str(&config.key_name)
        .map_err(|e| SyncError::auth(format!("invalid key name '{}': {e}", config.key_name)))?;
    let key = Key::new(
        config.key_algorithm,
        config.key_secret.expose(),
        name,
        None,
        None,
    )
    .map_err(|e| SyncError::auth(format!("invalid key '{}': {e}", config.key_name)))?;
    Ok(Arc::new(key))
}
