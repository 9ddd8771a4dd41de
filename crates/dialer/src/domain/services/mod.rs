//! Domain Services
//!
//! Pure dispatch policies shared by every dispatcher instance.

mod dispatch_failure;
mod retry_policy;

pub use dispatch_failure::*;
pub use retry_policy::*;
