//! Priority lanes.

use serde::{Deserialize, Serialize};

use crate::errors::TracelaneError;
use crate::impl_domain_status_conversions;

/// One of the three fixed priority classes that partition all telemetry.
///
/// Ordering follows priority: `Error < Performance < UserBehavior`, so
/// sorting ascending yields the highest-priority lane first. On the wire and
/// in storage a lane is its numeric priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PriorityLane {
    Error = 0,
    Performance = 1,
    UserBehavior = 2,
}

impl_domain_status_conversions!(PriorityLane {
    Error => "error",
    Performance => "performance",
    UserBehavior => "user_behavior",
});

impl PriorityLane {
    /// All lanes, highest priority first.
    pub const ALL: [Self; 3] = [Self::Error, Self::Performance, Self::UserBehavior];

    /// Numeric priority (0 is highest).
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Position in per-lane arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Next lane in the fixed rotation, wrapping back to `Error`.
    pub const fn next(self) -> Self {
        match self {
            Self::Error => Self::Performance,
            Self::Performance => Self::UserBehavior,
            Self::UserBehavior => Self::Error,
        }
    }

    /// Wire key used in a bundle map (`"0"`, `"1"`, `"2"`).
    pub fn wire_key(self) -> String {
        self.as_u8().to_string()
    }

    /// Parse a wire key back into a lane.
    pub fn from_wire_key(key: &str) -> Result<Self, TracelaneError> {
        let value: u8 = key
            .trim()
            .parse()
            .map_err(|_| TracelaneError::InvalidInput(format!("invalid lane key: {key}")))?;
        Self::try_from(value)
    }
}

impl From<PriorityLane> for u8 {
    fn from(lane: PriorityLane) -> Self {
        lane.as_u8()
    }
}

impl TryFrom<u8> for PriorityLane {
    type Error = TracelaneError;

    // `Self::Error` would be ambiguous with the associated type here.
    fn try_from(value: u8) -> Result<Self, TracelaneError> {
        match value {
            0 => Ok(PriorityLane::Error),
            1 => Ok(PriorityLane::Performance),
            2 => Ok(PriorityLane::UserBehavior),
            other => Err(TracelaneError::InvalidInput(format!("unknown priority lane: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_in_priority_order() {
        let mut sorted = PriorityLane::ALL;
        sorted.sort();
        assert_eq!(sorted, PriorityLane::ALL);
        assert_eq!(PriorityLane::ALL[0], PriorityLane::Error);
    }

    #[test]
    fn rotation_visits_every_lane() {
        let mut lane = PriorityLane::Error;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(lane);
            lane = lane.next();
        }
        assert_eq!(
            seen,
            vec![
                PriorityLane::Error,
                PriorityLane::Performance,
                PriorityLane::UserBehavior,
                PriorityLane::Error
            ]
        );
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&PriorityLane::Performance).unwrap(), "1");
        let lane: PriorityLane = serde_json::from_str("2").unwrap();
        assert_eq!(lane, PriorityLane::UserBehavior);
        assert!(serde_json::from_str::<PriorityLane>("7").is_err());
    }

    #[test]
    fn wire_keys_round_trip() {
        assert_eq!(PriorityLane::Error.wire_key(), "0");
        assert_eq!(PriorityLane::from_wire_key("1").unwrap(), PriorityLane::Performance);
        assert!(PriorityLane::from_wire_key("error").is_err());
    }

    #[test]
    fn display_is_lowercase_name() {
        assert_eq!(PriorityLane::UserBehavior.to_string(), "user_behavior");
        assert_eq!("ERROR".parse::<PriorityLane>(), Ok(PriorityLane::Error));
    }
}
