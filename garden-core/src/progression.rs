//! Garden progression: a pure counter rollover with no time dimension.
//!
//! One square per win; reaching the configured garden size atomically
//! resets the square count and increments the completed-garden count. No
//! partial state is ever observable, and cooldowns or round expiry never
//! touch these counters.

use serde::{Deserialize, Serialize};

/// Result of advancing the garden after a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenAdvance {
    /// Squares claimed after the advance (post-rollover).
    pub squares_claimed: u32,
    /// Gardens completed after the advance.
    pub gardens_completed: u32,
    /// Whether this win completed a garden.
    pub garden_just_completed: bool,
    /// The square count the garden held at the moment of completion (the
    /// full garden size), so a UI can animate the filled garden before
    /// clearing it. Equals `squares_claimed` when no garden completed.
    pub squares_before_reset: u32,
}

/// Advance the garden by one won square.
#[must_use]
pub fn advance(squares_claimed: u32, gardens_completed: u32, squares_per_garden: u32) -> GardenAdvance {
    let incremented = squares_claimed + 1;
    if incremented >= squares_per_garden {
        GardenAdvance {
            squares_claimed: 0,
            gardens_completed: gardens_completed + 1,
            garden_just_completed: true,
            squares_before_reset: incremented,
        }
    } else {
        GardenAdvance {
            squares_claimed: incremented,
            gardens_completed,
            garden_just_completed: false,
            squares_before_reset: incremented,
        }
    }
}
