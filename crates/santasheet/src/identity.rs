//! Sign-in boundary for santasheet.
//!
//! Signing in resolves a display name from the user's profile attributes and
//! classifies the user as admin against a configured allow-list. Everything
//! else in the crate assumes a [`Session`] already exists.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Profile attributes supplied by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileAttributes {
    /// First name.
    pub given_name: Option<String>,
    /// Last name.
    pub family_name: Option<String>,
    /// Contact email.
    pub email: Option<String>,
}

/// Source of profile attributes for signed-in users.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    /// Fetch the attributes of the user with the given login identifier.
    async fn fetch_attributes(&self, login_id: &str) -> Result<ProfileAttributes>;
}

/// Identity provider backed by the `[identity.profiles]` configuration table.
#[derive(Debug, Clone, Default)]
pub struct ConfigDirectory {
    profiles: BTreeMap<String, ProfileAttributes>,
}

impl ConfigDirectory {
    /// Build a directory; login identifiers match case-insensitively.
    #[must_use]
    pub fn new(profiles: &BTreeMap<String, ProfileAttributes>) -> Self {
        Self {
            profiles: profiles
                .iter()
                .map(|(login, attrs)| (login.trim().to_lowercase(), attrs.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for ConfigDirectory {
    async fn fetch_attributes(&self, login_id: &str) -> Result<ProfileAttributes> {
        self.profiles
            .get(&login_id.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| Error::profile_fetch(login_id, "no profile on record"))
    }
}

/// The set of administrator email addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: BTreeSet<String>,
}

impl AdminAllowList {
    /// Build an allow-list; addresses are compared case-insensitively.
    pub fn new<'a>(emails: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            emails: emails
                .into_iter()
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        }
    }

    /// Check whether `login_id` belongs to an administrator.
    #[must_use]
    pub fn is_admin(&self, login_id: &str) -> bool {
        self.emails.contains(&login_id.trim().to_lowercase())
    }

    /// Number of administrator addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Check if no administrators are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Pick the name shown for a user.
///
/// Priority: `given_name family_name` (trimmed), then the email attribute,
/// then the login identifier, then `fallback`. Without attributes (the fetch
/// failed) the chain starts at the login identifier.
#[must_use]
pub fn resolve_display_name(
    attrs: Option<&ProfileAttributes>,
    login_id: &str,
    fallback: &str,
) -> String {
    fn non_empty(s: &str) -> Option<String> {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    }

    let from_attrs = attrs.and_then(|attrs| {
        let first = attrs.given_name.as_deref().unwrap_or_default();
        let last = attrs.family_name.as_deref().unwrap_or_default();
        non_empty(&format!("{first} {last}"))
            .or_else(|| attrs.email.as_deref().and_then(non_empty))
    });

    from_attrs
        .or_else(|| non_empty(login_id))
        .unwrap_or_else(|| fallback.to_string())
}

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Login identifier (an email address).
    pub login_id: String,
    /// Resolved display name.
    pub display_name: String,
    /// Whether the user is on the admin allow-list.
    pub is_admin: bool,
}

impl Session {
    /// Fail unless this session belongs to an administrator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthorized`] for non-admin sessions.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::NotAuthorized {
                login_id: self.login_id.clone(),
            })
        }
    }
}

/// Establishes sessions.
#[derive(Debug, Clone)]
pub struct IdentityGate {
    provider: Arc<dyn IdentityProvider>,
    admins: AdminAllowList,
    fallback_name: String,
}

impl IdentityGate {
    /// Create a gate over the given provider and allow-list.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        admins: AdminAllowList,
        fallback_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            admins,
            fallback_name: fallback_name.into(),
        }
    }

    /// Sign in as `login_id`.
    ///
    /// A failed attribute fetch is not an error; the display name falls back
    /// to the login identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSignedIn`] when `login_id` is blank.
    pub async fn sign_in(&self, login_id: &str) -> Result<Session> {
        let login_id = login_id.trim();
        if login_id.is_empty() {
            return Err(Error::NotSignedIn);
        }

        let attrs = match self.provider.fetch_attributes(login_id).await {
            Ok(attrs) => Some(attrs),
            Err(e) => {
                warn!("Using login id as display name: {}", e);
                None
            }
        };

        let session = Session {
            login_id: login_id.to_string(),
            display_name: resolve_display_name(attrs.as_ref(), login_id, &self.fallback_name),
            is_admin: self.admins.is_admin(login_id),
        };
        info!(
            "Signed in {} (admin: {})",
            session.login_id, session.is_admin
        );
        Ok(session)
    }

    /// End a session.
    pub fn sign_out(&self, session: Session) {
        info!("Signed out {}", session.login_id);
    }
}
