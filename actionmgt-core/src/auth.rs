//! Endpoint authentication and its transition rules
//!
//! An action endpoint authenticates with one of four schemes. Each scheme is
//! described by an [`AuthScheme`] entry in [`AUTH_SCHEMES`]: the properties it
//! requires and an optional syntax check per property. Validation and
//! normalization are driven by that table, so adding a scheme is a new entry
//! rather than another `match` arm at every call site.

use crate::error::ClientError;
use crate::validation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Replacement text for secret property values in logs and audit output.
pub const MASKED_SECRET: &str = "********";

// ============================================================================
// AUTH TYPE & PROPERTIES
// ============================================================================

/// Authentication scheme of an action endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    /// No credentials are sent.
    None,
    Basic,
    Bearer,
    ApiKey,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::None => "NONE",
            AuthType::Basic => "BASIC",
            AuthType::Bearer => "BEARER",
            AuthType::ApiKey => "API_KEY",
        }
    }

    pub fn all() -> [AuthType; 4] {
        [AuthType::None, AuthType::Basic, AuthType::Bearer, AuthType::ApiKey]
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthType::all()
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClientError::InvalidAuthenticationType {
                value: s.to_string(),
            })
    }
}

/// Named property of an [`Authentication`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProperty {
    Username,
    Password,
    AccessToken,
    Header,
    Value,
}

impl AuthProperty {
    /// Stable property name used in stored form and secret references.
    pub fn name(&self) -> &'static str {
        match self {
            AuthProperty::Username => "username",
            AuthProperty::Password => "password",
            AuthProperty::AccessToken => "access_token",
            AuthProperty::Header => "header",
            AuthProperty::Value => "value",
        }
    }

    /// Human-readable field name used in validation errors.
    pub fn field_label(&self) -> &'static str {
        match self {
            AuthProperty::Username => "Username",
            AuthProperty::Password => "Password",
            AuthProperty::AccessToken => "Access Token",
            AuthProperty::Header => "API Key header name",
            AuthProperty::Value => "API Key value",
        }
    }

    /// Whether the value must go through the secret processor and be masked.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            AuthProperty::Password | AuthProperty::AccessToken | AuthProperty::Value
        )
    }
}

impl fmt::Display for AuthProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Authentication configuration of an action endpoint.
///
/// `Debug` masks secret property values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    #[serde(default)]
    pub properties: BTreeMap<AuthProperty, String>,
}

impl Authentication {
    pub fn new(auth_type: AuthType) -> Self {
        Self {
            auth_type,
            properties: BTreeMap::new(),
        }
    }

    pub fn none() -> Self {
        Self::new(AuthType::None)
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(AuthType::Basic)
            .with_property(AuthProperty::Username, username)
            .with_property(AuthProperty::Password, password)
    }

    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self::new(AuthType::Bearer).with_property(AuthProperty::AccessToken, access_token)
    }

    pub fn api_key(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(AuthType::ApiKey)
            .with_property(AuthProperty::Header, header)
            .with_property(AuthProperty::Value, value)
    }

    pub fn with_property(mut self, property: AuthProperty, value: impl Into<String>) -> Self {
        self.properties.insert(property, value.into());
        self
    }

    pub fn property(&self, property: AuthProperty) -> Option<&str> {
        self.properties.get(&property).map(String::as_str)
    }

    /// Properties whose values are secrets.
    pub fn secret_properties(&self) -> impl Iterator<Item = (AuthProperty, &str)> {
        self.properties
            .iter()
            .filter(|(property, _)| property.is_secret())
            .map(|(property, value)| (*property, value.as_str()))
    }

    /// Copy with every secret value replaced by [`MASKED_SECRET`].
    pub fn masked(&self) -> Self {
        let properties = self
            .properties
            .iter()
            .map(|(property, value)| {
                let shown = if property.is_secret() {
                    MASKED_SECRET.to_string()
                } else {
                    value.clone()
                };
                (*property, shown)
            })
            .collect();
        Self {
            auth_type: self.auth_type,
            properties,
        }
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = self.masked();
        f.debug_struct("Authentication")
            .field("auth_type", &masked.auth_type)
            .field("properties", &masked.properties)
            .finish()
    }
}

// ============================================================================
// SCHEME TABLE
// ============================================================================

/// Syntax check applied to a property value after the non-blank check.
pub type PropertyCheck = fn(&str) -> Result<(), ClientError>;

/// One required property of a scheme and its optional extra check.
#[derive(Clone, Copy)]
pub struct PropertyRule {
    pub property: AuthProperty,
    pub check: Option<PropertyCheck>,
}

impl fmt::Debug for PropertyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRule")
            .field("property", &self.property)
            .field("has_check", &self.check.is_some())
            .finish()
    }
}

/// Required property set of one authentication type.
#[derive(Debug, Clone, Copy)]
pub struct AuthScheme {
    pub auth_type: AuthType,
    pub rules: &'static [PropertyRule],
}

/// The scheme table, one entry per [`AuthType`].
pub static AUTH_SCHEMES: [AuthScheme; 4] = [
    AuthScheme {
        auth_type: AuthType::None,
        rules: &[],
    },
    AuthScheme {
        auth_type: AuthType::Basic,
        rules: &[
            PropertyRule {
                property: AuthProperty::Username,
                check: None,
            },
            PropertyRule {
                property: AuthProperty::Password,
                check: None,
            },
        ],
    },
    AuthScheme {
        auth_type: AuthType::Bearer,
        rules: &[PropertyRule {
            property: AuthProperty::AccessToken,
            check: None,
        }],
    },
    AuthScheme {
        auth_type: AuthType::ApiKey,
        rules: &[
            PropertyRule {
                property: AuthProperty::Header,
                check: Some(validation::validate_header),
            },
            PropertyRule {
                property: AuthProperty::Value,
                check: None,
            },
        ],
    },
];

impl AuthScheme {
    /// Look up the scheme for a type.
    pub fn for_type(auth_type: AuthType) -> &'static AuthScheme {
        AUTH_SCHEMES
            .iter()
            .find(|scheme| scheme.auth_type == auth_type)
            .unwrap_or(&AUTH_SCHEMES[0])
    }

    pub fn required_properties(&self) -> impl Iterator<Item = AuthProperty> + '_ {
        self.rules.iter().map(|rule| rule.property)
    }

    /// Validate `authentication` against this scheme.
    ///
    /// Stops at the first violation, naming the offending field.
    pub fn validate(&self, authentication: &Authentication) -> Result<(), ClientError> {
        for rule in self.rules {
            let value = authentication.property(rule.property);
            validation::validate_for_blank(rule.property.field_label(), value)?;
            if let (Some(check), Some(value)) = (rule.check, value) {
                check(value)?;
            }
        }
        Ok(())
    }

    /// Copy of `authentication` holding only the properties this scheme uses.
    pub fn normalize(&self, authentication: &Authentication) -> Authentication {
        let properties = authentication
            .properties
            .iter()
            .filter(|(property, _)| self.rules.iter().any(|rule| rule.property == **property))
            .map(|(property, value)| (*property, value.clone()))
            .collect();
        Authentication {
            auth_type: self.auth_type,
            properties,
        }
    }
}

/// Validate an authentication against the scheme of its own type.
pub fn validate_authentication(authentication: &Authentication) -> Result<(), ClientError> {
    AuthScheme::for_type(authentication.auth_type).validate(authentication)
}

// ============================================================================
// TRANSITIONS
// ============================================================================

/// How a stored endpoint must be rewritten to adopt a new authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTransition {
    /// Same type: only the property mapping is replaced.
    PropertiesOnly,
    /// Type changes: the whole endpoint is rebuilt around the new authentication
    /// so no property of the old type survives.
    ReplaceEndpoint,
}

impl AuthTransition {
    pub fn between(current: &Authentication, requested: &Authentication) -> Self {
        if current.auth_type == requested.auth_type {
            AuthTransition::PropertiesOnly
        } else {
            AuthTransition::ReplaceEndpoint
        }
    }
}
