use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;

use crate::config::KeySecret;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("name is empty")]
    Empty,
    #[error("label too long (max 63 characters)")]
    LabelTooLong,
    #[error("name too long (max 253 characters)")]
    TooLong,
    #[error("label contains invalid characters (only a-z, 0-9, '_' and '-' allowed)")]
    InvalidCharacters,
    #[error("label must not start or end with '-'")]
    LeadingOrTrailingHyphen,
    #[error("key secret is not valid base64")]
    InvalidSecret,
    #[error("key secret is empty")]
    EmptySecret,
}

lazy_static::lazy_static! {
    /// Lowercase letters, digits, '_' and '-'
    static ref LABEL_RE: Regex = Regex::new(r"^[a-z0-9_-]+$").unwrap();
}

pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.is_empty() {
        return Err(ValidationError::Empty);
    }
    if label.len() > 63 {
        return Err(ValidationError::LabelTooLong);
    }
    if !LABEL_RE.is_match(label) {
        return Err(ValidationError::InvalidCharacters);
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(ValidationError::LeadingOrTrailingHyphen);
    }

    Ok(())
}

/// Checks an ASCII domain name and returns it lowercased with a trailing dot.
pub fn normalize_fqdn(name: &str) -> Result<String, ValidationError> {
    let d = name.trim().trim_end_matches('.').to_ascii_lowercase();
    if d.is_empty() {
        return Err(ValidationError::Empty);
    }
    if d.len() > 253 {
        return Err(ValidationError::TooLong);
    }
    for label in d.split('.') {
        validate_label(label)?;
    }
    Ok(format!("{d}."))
}

/// Decodes a base64 TSIG secret as written in a BIND `key` clause.
pub fn decode_key_secret(encoded: &str) -> Result<KeySecret, ValidationError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| ValidationError::InvalidSecret)?;
    if bytes.is_empty() {
        return Err(ValidationError::EmptySecret);
    }
    Ok(KeySecret::new(bytes))
}
