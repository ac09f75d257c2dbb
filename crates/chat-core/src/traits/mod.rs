//! Repository traits (ports) - define the interface for data access
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation.

mod directory;

pub use directory::{RepoResult, UserDirectory};
