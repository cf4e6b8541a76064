pub mod coordinator;
pub mod signals;

pub use coordinator::{IngestionCoordinator, IngestionReport};
