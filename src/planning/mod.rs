pub mod synthesizer;

pub use synthesizer::{build_phases, PlanSettings, PlanSynthesizer};
