//! Service Ports
//!
//! Abstract interfaces for external services.

mod call_initiator;

pub use call_initiator::*;
