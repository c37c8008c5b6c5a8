//! Timestamp type used throughout the chain.
//!
//! Timestamps are Unix epoch seconds (UTC) and serialize as plain integers,
//! which keeps the canonical JSON encoding deterministic across nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_integer() {
        let ts = Timestamp::new(1_700_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1700000000");
    }

    #[test]
    fn ordering() {
        assert!(Timestamp::new(1) < Timestamp::new(2));
        assert_eq!(Timestamp::EPOCH.as_secs(), 0);
    }
}
