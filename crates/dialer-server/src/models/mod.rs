//! Dialer API Data Models
//!
//! - Call: queued outbound call and its lifecycle
//! - Completion: provider callback payload
//! - Metrics: per-status counts

mod call;
mod completion;
mod metrics;

pub use call::*;
pub use completion::*;
pub use metrics::*;
