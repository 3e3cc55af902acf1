use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// Most recent OAuth credential for a (namespace, identity) pair.
///
/// Written by the out-of-scope authorization callback flow; the engine only
/// ever reads the latest token and never refreshes it. An expired token is
/// simply unusable here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub namespace: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now)
    }

    /// A token matches an identity when either its user or its organization
    /// binding agrees. Tokens always carry at least one of the two.
    pub fn matches_identity(&self, identity: &Identity) -> bool {
        if let Some(user_id) = &self.user_id {
            if *user_id == identity.user_id {
                return true;
            }
        }
        match (&self.organization_id, &identity.organization_id) {
            (Some(token_org), Some(org)) => token_org == org,
            _ => false,
        }
    }
}
