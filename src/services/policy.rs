//! Decides whether a submission is worth an AI refinement.

/// Returned to every caller immediately, and kept when no refinement runs.
pub const CANNED_GUIDANCE: &str = "Some days naturally include more screen time than planned, and that’s okay. \
A calmer wind-down tomorrow evening may help your child settle more easily. \
You’re doing your best — small adjustments really do help.";

/// Below this many minutes no refinement runs at any age.
const UNIVERSAL_FLOOR_MINUTES: i32 = 30;
/// Oldest age that counts as "young".
const YOUNG_CHILD_MAX_AGE: i32 = 6;
const YOUNG_CHILD_SKIP_BELOW: i32 = 60;
const OLDER_CHILD_SKIP_BELOW: i32 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    SkipAi,
    RunAi,
}

pub fn decide(age: i32, screen_minutes: i32) -> Decision {
    if screen_minutes < UNIVERSAL_FLOOR_MINUTES {
        return Decision::SkipAi;
    }

    let threshold = if age <= YOUNG_CHILD_MAX_AGE {
        YOUNG_CHILD_SKIP_BELOW
    } else {
        OLDER_CHILD_SKIP_BELOW
    };

    if screen_minutes < threshold {
        Decision::SkipAi
    } else {
        Decision::RunAi
    }
}
