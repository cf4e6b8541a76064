pub mod detector;
pub mod fields;

pub use detector::{default_targets, validate_targets, GapDetector, Targets};
pub use fields::{priority, Workstream, TRACKED_FIELDS};
