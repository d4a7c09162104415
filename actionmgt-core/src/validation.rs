//! Field validators
//!
//! Pure checks with no state. Each returns the first violation as a
//! [`ClientError::InvalidField`] naming the field; values never appear in
//! the error so secrets cannot leak through it.

use crate::error::ClientError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

pub const ACTION_NAME_FIELD: &str = "Action name";
pub const ENDPOINT_URI_FIELD: &str = "Endpoint URI";
pub const CERTIFICATE_NAME_FIELD: &str = "Certificate name";
pub const CERTIFICATE_CONTENT_FIELD: &str = "Certificate content";

/// Upper bound on action and certificate names.
pub const MAX_NAME_LENGTH: usize = 255;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

static ACTION_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]([a-zA-Z0-9_ -]*[a-zA-Z0-9_-])?$").expect("Invalid action name regex")
});

static HTTPS_URI_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://[^\s/$.?#][^\s]*$").expect("Invalid URI regex"));

static HTTP_URI_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("Invalid URI regex"));

// RFC 9110 token characters.
static HEADER_TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[!#$%&'*+.^_`|~0-9A-Za-z-]+$").expect("Invalid header token regex")
});

/// Reject a missing or whitespace-only value.
pub fn validate_for_blank(field: &str, value: Option<&str>) -> Result<(), ClientError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ClientError::invalid_field(field, "must not be blank")),
    }
}

/// Whether an optional PATCH value counts as supplied.
pub fn is_supplied(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

pub fn validate_action_name(name: &str) -> Result<(), ClientError> {
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ClientError::invalid_field(
            ACTION_NAME_FIELD,
            format!("must not exceed {} characters", MAX_NAME_LENGTH),
        ));
    }
    if !ACTION_NAME_PATTERN.is_match(name) {
        return Err(ClientError::invalid_field(
            ACTION_NAME_FIELD,
            "may only contain letters, digits, '-', '_' and inner spaces",
        ));
    }
    Ok(())
}

/// Check that `uri` is an absolute HTTPS URL (HTTP too when `allow_insecure`).
pub fn validate_endpoint_uri(uri: &str, allow_insecure: bool) -> Result<(), ClientError> {
    let pattern = if allow_insecure {
        &HTTP_URI_PATTERN
    } else {
        &HTTPS_URI_PATTERN
    };
    if pattern.is_match(uri) {
        Ok(())
    } else if allow_insecure {
        Err(ClientError::invalid_field(
            ENDPOINT_URI_FIELD,
            "must be an absolute http or https URL",
        ))
    } else {
        Err(ClientError::invalid_field(
            ENDPOINT_URI_FIELD,
            "must be an absolute https URL",
        ))
    }
}

/// Check that `header` is a valid HTTP header name token.
///
/// Control characters, CR/LF, whitespace and separators are all rejected.
pub fn validate_header(header: &str) -> Result<(), ClientError> {
    if HEADER_TOKEN_PATTERN.is_match(header) {
        Ok(())
    } else {
        Err(ClientError::invalid_field(
            "API Key header name",
            "must be a valid HTTP header name",
        ))
    }
}

pub fn validate_certificate_name(name: Option<&str>) -> Result<(), ClientError> {
    validate_for_blank(CERTIFICATE_NAME_FIELD, name)?;
    if name.map(|n| n.chars().count()).unwrap_or(0) > MAX_NAME_LENGTH {
        return Err(ClientError::invalid_field(
            CERTIFICATE_NAME_FIELD,
            format!("must not exceed {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

/// Check that `content` is a single PEM-armored certificate block.
pub fn validate_certificate_content(content: &[u8]) -> Result<(), ClientError> {
    let invalid = |reason: &str| ClientError::invalid_field(CERTIFICATE_CONTENT_FIELD, reason);

    let text = std::str::from_utf8(content).map_err(|_| invalid("must be PEM encoded text"))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(invalid("must not be blank"));
    }

    let body = text
        .strip_prefix(PEM_BEGIN)
        .and_then(|rest| rest.strip_suffix(PEM_END))
        .ok_or_else(|| invalid("must be a PEM certificate block"))?;

    let base64_body: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if base64_body.is_empty() {
        return Err(invalid("certificate body is empty"));
    }
    STANDARD
        .decode(base64_body.as_bytes())
        .map_err(|_| invalid("certificate body is not valid base64"))?;
    Ok(())
}
