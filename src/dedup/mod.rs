mod coordinator;
mod outcome;
mod policy;

pub use coordinator::RequestCoordinator;
pub use outcome::{CallRole, DedupOutcome};
pub use policy::EvictionPolicy;
