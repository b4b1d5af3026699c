//! Account domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// User-chosen settings. Missing keys fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    pub locale: String,
    pub theme: Theme,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            locale: "en".into(),
            theme: Theme::System,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    /// Trimmed and lower-cased; unique across all accounts.
    pub email: String,
    /// Provider-scoped identifier. Once set it is never cleared.
    pub federated_id: Option<String>,
    pub display_name: String,
    /// PHC-format Argon2id hash. Never serialized to clients.
    #[serde(skip_serializing, default)]
    pub credential_hash: Option<String>,
    pub avatar_url: String,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account can sign in with a local password.
    pub fn has_local_credential(&self) -> bool {
        self.credential_hash.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CreateAccount {
    /// Already normalized by the caller.
    pub email: String,
    pub federated_id: Option<String>,
    pub display_name: String,
    /// Already hashed by the caller.
    pub credential_hash: Option<String>,
    pub avatar_url: String,
    pub preferences: Preferences,
}

/// Verified profile handed over by an external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedProfile {
    pub external_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}
