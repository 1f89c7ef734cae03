pub mod coordinator;
pub mod reconcile;
pub mod schedule;

pub use coordinator::Coordinator;
