//! Actor Context
//!
//! Identity of the caller as established by the upstream gateway, plus
//! tracing metadata. The ledger only uses it for cross-member access checks
//! and to record who issued fines and prices.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;

/// Context for an operation, used for access checks and tracing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// Authenticated user performing the call
    pub user_id: Uuid,

    /// Member profile of the user, if they have one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<Uuid>,

    /// Whether the user carries administrator capability
    pub is_admin: bool,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl ActorContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            member_id: None,
            is_admin: false,
            correlation_id: None,
        }
    }

    /// Shorthand for a member acting on their own behalf.
    pub fn member(user_id: Uuid, member_id: Uuid) -> Self {
        Self::new(user_id).with_member(member_id)
    }

    pub fn with_member(mut self, member_id: Uuid) -> Self {
        self.member_id = Some(member_id);
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    /// The caller's own member id.
    pub fn require_member(&self) -> Result<Uuid, DomainError> {
        self.member_id
            .ok_or_else(|| DomainError::Forbidden("caller has no member profile".to_string()))
    }

    /// Resolve the member filter this actor may query with.
    ///
    /// Admins get `requested` back unchanged (`None` meaning every member).
    /// Everyone else is pinned to their own member and may not name another.
    pub fn scope_member(&self, requested: Option<Uuid>) -> Result<Option<Uuid>, DomainError> {
        if self.is_admin {
            return Ok(requested);
        }
        let own = self.require_member()?;
        match requested {
            Some(other) if other != own => Err(DomainError::Forbidden(
                "cannot access another member's records".to_string(),
            )),
            _ => Ok(Some(own)),
        }
    }
}
