//! Member reference
//!
//! Members are owned by the profile service; the ledger only reads them and
//! flips the activation timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.activated_at.is_some()
    }

    /// Stamp activation once; returns false if already active.
    pub fn activate(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_active() {
            return false;
        }
        self.activated_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_activate_only_once() {
        let now = Utc::now();
        let mut member = Member {
            id: Uuid::new_v4(),
            activated_at: None,
            created_at: now,
        };

        assert!(member.activate(now));
        assert!(!member.activate(now + Duration::hours(1)));
        assert_eq!(member.activated_at, Some(now));
    }
}
