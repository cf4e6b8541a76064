pub mod connection;
pub mod entity;
pub mod schema;
pub mod runs;
pub mod assets;
pub mod evidence;
pub mod scores;
pub mod gaps;
pub mod plans;
pub mod artifacts;

pub use connection::RunStore;
pub use entity::{Entity, Filter};
