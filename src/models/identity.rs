use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// The identity context a composition is performed for.
///
/// `user_id` is mandatory; organization and project are optional and widen
/// the set of configuration scopes that get queried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Identity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: None,
            project_id: None,
        }
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// A blank user id is the one malformed input that fails a whole
    /// composition call.
    pub fn validate(&self) -> Result<(), ComposeError> {
        if self.user_id.trim().is_empty() {
            return Err(ComposeError::InvalidIdentity(
                "user_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_id_is_rejected() {
        assert!(Identity::user("  ").validate().is_err());
        assert!(Identity::user("").validate().is_err());
        assert!(Identity::user("u1").validate().is_ok());
    }

    #[test]
    fn builder_sets_optional_ids() {
        let identity = Identity::user("u1")
            .with_organization("o1")
            .with_project("p1");
        assert_eq!(identity.organization_id.as_deref(), Some("o1"));
        assert_eq!(identity.project_id.as_deref(), Some("p1"));
    }
}
