use serde::{Deserialize, Serialize};

use crate::types::Target;

/// A target whose cached `vote_count` disagrees with the sum of its vote rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountDrift {
    pub target: Target,
    /// Value currently cached on the target row.
    pub stored: i32,
    /// `Σ vote_type` over the live vote rows.
    pub actual: i32,
}

impl CountDrift {
    pub fn difference(&self) -> i32 {
        self.actual - self.stored
    }
}
