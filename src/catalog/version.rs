//! Agent version records

use chrono::{DateTime, Duration, Utc};

use crate::DELETION_GRACE_DAYS;

/// Lifecycle status of an immutable agent version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// Live and schedulable
    Active,
    /// Deletion requested; still fully schedulable until the grace window
    /// lapses
    PendingDeletion,
    /// Gone; never schedulable again
    Deleted,
}

/// One immutable agent version
#[derive(Debug, Clone)]
pub struct AgentVersion {
    /// Agent identifier
    pub agent_id: String,
    /// Version number, immutable once active
    pub version: u32,
    /// Current lifecycle status
    pub status: VersionStatus,
    /// When a pending deletion becomes effective
    pub deletion_eligible_at: Option<DateTime<Utc>>,
}

impl AgentVersion {
    /// Create a new active version
    pub fn new(agent_id: impl Into<String>, version: u32) -> Self {
        Self {
            agent_id: agent_id.into(),
            version,
            status: VersionStatus::Active,
            deletion_eligible_at: None,
        }
    }

    /// Whether shards of this version may be scheduled
    pub fn is_schedulable(&self) -> bool {
        self.status != VersionStatus::Deleted
    }

    /// Mark deletion requested; effective after the grace window
    pub fn request_deletion(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let eligible_at = now + Duration::days(DELETION_GRACE_DAYS);
        self.status = VersionStatus::PendingDeletion;
        self.deletion_eligible_at = Some(eligible_at);
        eligible_at
    }

    /// Whether a pending deletion is past its grace window
    pub fn deletion_due(&self, now: DateTime<Utc>) -> bool {
        self.status == VersionStatus::PendingDeletion
            && self.deletion_eligible_at.is_some_and(|at| now >= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_deletion_stays_schedulable() {
        let mut version = AgentVersion::new("printer", 1);
        let now = Utc::now();

        version.request_deletion(now);
        assert_eq!(version.status, VersionStatus::PendingDeletion);
        assert!(version.is_schedulable());
        assert!(!version.deletion_due(now));
    }

    #[test]
    fn test_deletion_due_after_grace() {
        let mut version = AgentVersion::new("printer", 1);
        let now = Utc::now();

        let eligible_at = version.request_deletion(now);
        assert_eq!(eligible_at, now + Duration::days(DELETION_GRACE_DAYS));
        assert!(version.deletion_due(eligible_at));
        assert!(version.deletion_due(eligible_at + Duration::hours(1)));
    }

    #[test]
    fn test_deleted_is_not_schedulable() {
        let mut version = AgentVersion::new("printer", 1);
        version.status = VersionStatus::Deleted;
        assert!(!version.is_schedulable());
    }
}
