//! Request-scoped user context.
//!
//! Every upload, grouping and matching call receives an [`Identity`]
//! explicitly; storage namespaces are derived from it.

use crate::keys::sanitize_identifier;
use thiserror::Error;

pub const DEFAULT_ROLE: &str = "user";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("User authentication required. Please log in to continue.")]
    Missing,
}

/// The signed-in user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    email: Option<String>,
    name: Option<String>,
    role: String,
}

impl Identity {
    /// Build an identity. At least one of `email` or `name` must be non-blank;
    /// a blank or absent role falls back to [`DEFAULT_ROLE`].
    pub fn new(
        email: Option<String>,
        name: Option<String>,
        role: Option<String>,
    ) -> Result<Self, IdentityError> {
        let email = non_blank(email);
        let name = non_blank(name);
        if email.is_none() && name.is_none() {
            return Err(IdentityError::Missing);
        }
        Ok(Self {
            email,
            name,
            role: non_blank(role).unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        })
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// The raw identifier the storage folder is derived from (email wins over name).
    pub fn identifier(&self) -> &str {
        self.email
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    /// Sanitized folder name for this user.
    pub fn folder(&self) -> String {
        sanitize_identifier(self.identifier())
    }

    /// `{role}/{folder}/`
    pub fn root_prefix(&self) -> String {
        format!("{}/{}/", self.role, self.folder())
    }

    /// `{role}/{folder}/{event_id}/`
    pub fn event_prefix(&self, event_id: &str) -> String {
        format!("{}{}/", self.root_prefix(), event_id)
    }

    /// `{role}/{folder}/selfies/`
    pub fn selfie_prefix(&self) -> String {
        format!("{}selfies/", self.root_prefix())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_email_or_name() {
        assert_eq!(
            Identity::new(None, None, Some("admin".into())),
            Err(IdentityError::Missing)
        );
        assert_eq!(
            Identity::new(Some("  ".into()), Some(String::new()), None),
            Err(IdentityError::Missing)
        );
    }

    #[test]
    fn test_email_preferred_over_name() {
        let id = Identity::new(Some("ann@example.com".into()), Some("Ann".into()), None).unwrap();
        assert_eq!(id.identifier(), "ann@example.com");
        assert_eq!(id.folder(), "ann_example_com");
    }

    #[test]
    fn test_name_used_without_email() {
        let id = Identity::new(None, Some("Ann Lee".into()), None).unwrap();
        assert_eq!(id.folder(), "Ann_Lee");
    }

    #[test]
    fn test_role_defaults_to_user() {
        let id = Identity::new(Some("a@b.c".into()), None, Some(" ".into())).unwrap();
        assert_eq!(id.role(), "user");
    }

    #[test]
    fn test_prefixes() {
        let id = Identity::new(Some("a.b@c.com".into()), None, Some("photographer".into())).unwrap();
        assert_eq!(id.root_prefix(), "photographer/a_b_c_com/");
        assert_eq!(id.event_prefix("1717"), "photographer/a_b_c_com/1717/");
        assert_eq!(id.selfie_prefix(), "photographer/a_b_c_com/selfies/");
    }
}
