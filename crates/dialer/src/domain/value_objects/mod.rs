//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod call_status;
mod pagination;
mod provider_outcome;
mod status_counts;

pub use call_status::*;
pub use pagination::*;
pub use provider_outcome::*;
pub use status_counts::*;
