pub mod aggregate;
pub mod engine;
pub mod methodology;
pub mod quadrant;

pub use engine::{ScoringEngine, ScoringReport};
pub use methodology::{methodology_for, QualityMethodology};
pub use quadrant::classify;
