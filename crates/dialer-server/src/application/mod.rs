//! Application Layer (Use Cases)
//!
//! Orchestrates domain operations and coordinates between
//! the call store, the call provider and the HTTP surface.

mod call_service;
mod correlator;
mod dispatch_loop;
mod dispatcher;
mod gate;
mod retry_scheduler;
mod sweeper;

pub use call_service::CallService;
pub use correlator::{CompletionCorrelator, CompletionOutcome, CompletionSignal};
pub use dispatch_loop::{DispatchLoop, DispatchLoopConfig, Tick};
pub use dispatcher::{CallDispatcher, DispatchOutcome};
pub use gate::ConcurrencyGate;
pub use retry_scheduler::{RetryOutcome, RetryScheduler};
pub use sweeper::ExpirySweeper;
