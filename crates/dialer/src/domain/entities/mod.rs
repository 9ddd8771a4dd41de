//! Domain Entities
//!
//! Pure domain models without infrastructure dependencies.
//! - Call: Outbound phone call request and its dispatch state
//! - CallPatch: Partial update applied to a call record

mod call;

pub use call::*;
