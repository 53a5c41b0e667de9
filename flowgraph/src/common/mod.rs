//! Common utilities module
//!
//! Small helpers shared by the index, the resolver and the expander.

/// Overall analysis deadline tracking
pub mod deadline;

/// Environment variable loading utilities
pub mod env_loader;

pub use deadline::{Deadline, DeadlineExceeded};
pub use env_loader::{load_env_list, load_env_optional, load_env_parsed, EnvLoader};
