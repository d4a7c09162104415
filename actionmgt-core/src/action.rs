//! Action entity and its request models

use crate::auth::{AuthScheme, Authentication};
use crate::error::ClientError;
use crate::tenant::EntityId;
use crate::validation::is_supplied;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ACTION TYPE
// ============================================================================

/// Extension point an action is bound to.
///
/// Each variant has a stable path segment used by callers to address it;
/// [`ActionType::from_path`] is the only way a caller-supplied string becomes
/// an `ActionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    PreIssueAccessToken,
    PreUpdatePassword,
    PreUpdateProfile,
    PreRegistration,
    Authentication,
}

impl ActionType {
    pub fn all() -> [ActionType; 5] {
        [
            ActionType::PreIssueAccessToken,
            ActionType::PreUpdatePassword,
            ActionType::PreUpdateProfile,
            ActionType::PreRegistration,
            ActionType::Authentication,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::PreIssueAccessToken => "PRE_ISSUE_ACCESS_TOKEN",
            ActionType::PreUpdatePassword => "PRE_UPDATE_PASSWORD",
            ActionType::PreUpdateProfile => "PRE_UPDATE_PROFILE",
            ActionType::PreRegistration => "PRE_REGISTRATION",
            ActionType::Authentication => "AUTHENTICATION",
        }
    }

    /// External path segment naming this type.
    pub fn path_param(&self) -> &'static str {
        match self {
            ActionType::PreIssueAccessToken => "preIssueAccessToken",
            ActionType::PreUpdatePassword => "preUpdatePassword",
            ActionType::PreUpdateProfile => "preUpdateProfile",
            ActionType::PreRegistration => "preRegistration",
            ActionType::Authentication => "authentication",
        }
    }

    /// Reverse lookup of a path segment. Matching is exact.
    pub fn from_path(path: &str) -> Result<Self, ClientError> {
        ActionType::all()
            .into_iter()
            .find(|t| t.path_param() == path)
            .ok_or_else(|| ClientError::InvalidActionType {
                path: path.to_string(),
            })
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an action is invoked by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    #[default]
    Active,
    Inactive,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Active => "ACTIVE",
            ActionStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// Outbound endpoint of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub uri: String,
    pub authentication: Authentication,
}

impl EndpointConfig {
    pub fn new(uri: impl Into<String>, authentication: Authentication) -> Self {
        Self {
            uri: uri.into(),
            authentication,
        }
    }

    /// Same endpoint with secret properties masked.
    pub fn masked(&self) -> Self {
        Self {
            uri: self.uri.clone(),
            authentication: self.authentication.masked(),
        }
    }
}

/// A tenant-configured action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ActionStatus,
    pub endpoint: EndpointConfig,
}

impl Action {
    pub fn masked(&self) -> Self {
        Self {
            endpoint: self.endpoint.masked(),
            ..self.clone()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ActionStatus::Active
    }
}

// ============================================================================
// REQUEST MODELS
// ============================================================================

/// Creation request for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub endpoint: EndpointConfig,
}

impl ActionModel {
    pub fn new(name: impl Into<String>, endpoint: EndpointConfig) -> Self {
        Self {
            name: name.into(),
            description: None,
            endpoint,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build the stored entity. New actions start active and carry only the
    /// properties their authentication type uses.
    pub fn into_action(self, id: EntityId, action_type: ActionType) -> Action {
        let authentication = AuthScheme::for_type(self.endpoint.authentication.auth_type)
            .normalize(&self.endpoint.authentication);
        Action {
            id,
            action_type,
            name: self.name,
            description: self.description.filter(|d| is_supplied(Some(d.as_str()))),
            status: ActionStatus::Active,
            endpoint: EndpointConfig::new(self.endpoint.uri, authentication),
        }
    }
}

/// Partial endpoint update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPatch {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub authentication: Option<Authentication>,
}

impl EndpointPatch {
    pub fn is_empty(&self) -> bool {
        self.uri.is_none() && self.authentication.is_none()
    }
}

/// Partial action update. `None` and blank values leave the stored field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoint: Option<EndpointPatch>,
}

impl ActionPatch {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.endpoint.get_or_insert_with(EndpointPatch::default).uri = Some(uri.into());
        self
    }

    pub fn with_authentication(mut self, authentication: Authentication) -> Self {
        self.endpoint
            .get_or_insert_with(EndpointPatch::default)
            .authentication = Some(authentication);
        self
    }

    /// Copy with blank strings dropped and an empty endpoint patch removed.
    pub fn normalized(&self) -> Self {
        let keep = |value: &Option<String>| {
            value.clone().filter(|v| is_supplied(Some(v.as_str())))
        };
        let endpoint = self
            .endpoint
            .as_ref()
            .map(|endpoint| EndpointPatch {
                uri: keep(&endpoint.uri),
                authentication: endpoint.authentication.clone(),
            })
            .filter(|endpoint| !endpoint.is_empty());
        Self {
            name: keep(&self.name),
            description: keep(&self.description),
            endpoint,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.endpoint.as_ref().map_or(true, EndpointPatch::is_empty)
    }

    pub fn uri(&self) -> Option<&str> {
        self.endpoint.as_ref().and_then(|e| e.uri.as_deref())
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.endpoint.as_ref().and_then(|e| e.authentication.as_ref())
    }

    /// Merge this patch over `existing`.
    ///
    /// A supplied authentication replaces the stored one whole, normalized to
    /// the properties of its own type, so nothing from a previous type
    /// survives. Id, type and status never change.
    pub fn apply_to(&self, existing: &Action) -> Action {
        let patch = self.normalized();
        let mut updated = existing.clone();
        if let Some(name) = patch.name {
            updated.name = name;
        }
        if let Some(description) = patch.description {
            updated.description = Some(description);
        }
        if let Some(endpoint) = patch.endpoint {
            if let Some(uri) = endpoint.uri {
                updated.endpoint.uri = uri;
            }
            if let Some(authentication) = endpoint.authentication {
                updated.endpoint.authentication =
                    AuthScheme::for_type(authentication.auth_type).normalize(&authentication);
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProperty, AuthType};

    fn sample_action() -> Action {
        ActionModel::new(
            "enricher",
            EndpointConfig::new("https://hooks.example.com", Authentication::basic("u", "p")),
        )
        .with_description("adds claims")
        .into_action("id-1".to_string(), ActionType::PreIssueAccessToken)
    }

    #[test]
    fn test_from_path_round_trips_every_type() {
        for action_type in ActionType::all() {
            assert_eq!(
                ActionType::from_path(action_type.path_param()).unwrap(),
                action_type
            );
        }
    }

    #[test]
    fn test_from_path_rejects_unknown_and_case_mismatch() {
        assert_eq!(
            ActionType::from_path("preIssueToken"),
            Err(ClientError::InvalidActionType {
                path: "preIssueToken".to_string()
            })
        );
        assert!(ActionType::from_path("PREISSUEACCESSTOKEN").is_err());
        assert!(ActionType::from_path("").is_err());
    }

    #[test]
    fn test_action_type_display_and_serde_agree() {
        let json = serde_json::to_string(&ActionType::PreUpdatePassword).unwrap();
        assert_eq!(json, "\"PRE_UPDATE_PASSWORD\"");
        assert_eq!(ActionType::PreUpdatePassword.to_string(), "PRE_UPDATE_PASSWORD");
    }

    #[test]
    fn test_into_action_starts_active_and_normalizes() {
        let model = ActionModel::new(
            "a",
            EndpointConfig::new(
                "https://x.example.com",
                Authentication::bearer("t").with_property(AuthProperty::Username, "stray"),
            ),
        )
        .with_description("   ");
        let action = model.into_action("id".to_string(), ActionType::PreRegistration);
        assert_eq!(action.status, ActionStatus::Active);
        assert_eq!(action.description, None);
        assert_eq!(action.endpoint.authentication, Authentication::bearer("t"));
    }

    #[test]
    fn test_patch_name_only_keeps_everything_else() {
        let existing = sample_action();
        let updated = ActionPatch::default().with_name("renamed").apply_to(&existing);
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.endpoint, existing.endpoint);
        assert_eq!(updated.status, existing.status);
        assert_eq!(updated.description, existing.description);
    }

    #[test]
    fn test_patch_blank_fields_are_ignored() {
        let existing = sample_action();
        let patch = ActionPatch::default().with_name("  ").with_uri("");
        assert!(patch.normalized().is_empty());
        assert_eq!(patch.apply_to(&existing), existing);
    }

    #[test]
    fn test_patch_auth_type_switch_replaces_properties() {
        let existing = sample_action();
        let updated = ActionPatch::default()
            .with_authentication(Authentication::bearer("tok"))
            .apply_to(&existing);
        assert_eq!(updated.endpoint.authentication.auth_type, AuthType::Bearer);
        assert!(updated
            .endpoint
            .authentication
            .property(AuthProperty::Username)
            .is_none());
        assert_eq!(updated.endpoint.uri, existing.endpoint.uri);
    }

    #[test]
    fn test_masked_action_hides_secrets() {
        let action = sample_action().masked();
        assert_eq!(
            action.endpoint.authentication.property(AuthProperty::Password),
            Some(crate::MASKED_SECRET)
        );
        assert_eq!(
            action.endpoint.authentication.property(AuthProperty::Username),
            Some("u")
        );
    }
}
