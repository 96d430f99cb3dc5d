//! Durable ingest jobs.

use serde::{Deserialize, Serialize};

use super::lane::PriorityLane;
use crate::impl_domain_status_conversions;

/// Lifecycle of a job in the durable queue.
///
/// Jobs are `Waiting` until an ingest tick claims them (`Active`) and are
/// deleted once handed off. Jobs left `Active` by a crash are returned to
/// `Waiting` on the next start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
}

impl_domain_status_conversions!(JobStatus {
    Waiting => "waiting",
    Active => "active",
});

/// Ordering requested from the durable queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrder {
    /// Highest-priority lane first, oldest first within a lane.
    Natural,
    /// The given lane first, then natural order for the rest.
    Prefer(PriorityLane),
}

impl JobOrder {
    /// Sort rank of a lane under this ordering (lower sorts first).
    pub fn rank(self, lane: PriorityLane) -> u8 {
        match self {
            Self::Natural => lane.as_u8(),
            Self::Prefer(preferred) if preferred == lane => 0,
            Self::Prefer(_) => lane.as_u8() + 1,
        }
    }
}

/// One opaque client payload plus its priority, as stored in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub lane: PriorityLane,
    /// JSON of one wire body: a sealed string or a plaintext event array.
    pub payload: String,
    pub status: JobStatus,
    /// Unix millis.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_rank_follows_priority() {
        let order = JobOrder::Natural;
        assert!(order.rank(PriorityLane::Error) < order.rank(PriorityLane::Performance));
        assert!(order.rank(PriorityLane::Performance) < order.rank(PriorityLane::UserBehavior));
    }

    #[test]
    fn preferred_lane_sorts_first_then_natural() {
        let order = JobOrder::Prefer(PriorityLane::UserBehavior);
        let mut lanes = PriorityLane::ALL.to_vec();
        lanes.sort_by_key(|lane| order.rank(*lane));
        assert_eq!(
            lanes,
            vec![PriorityLane::UserBehavior, PriorityLane::Error, PriorityLane::Performance]
        );
    }

    #[test]
    fn status_parses_from_storage_strings() {
        assert_eq!("active".parse::<JobStatus>(), Ok(JobStatus::Active));
        assert_eq!(JobStatus::Waiting.to_string(), "waiting");
    }
}
