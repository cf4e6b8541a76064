pub mod run;
pub mod asset;
pub mod evidence;
pub mod score;
pub mod gap;
pub mod plan;
pub mod artifact;

pub use run::*;
pub use asset::*;
pub use evidence::*;
pub use score::*;
pub use gap::*;
pub use plan::*;
pub use artifact::*;
