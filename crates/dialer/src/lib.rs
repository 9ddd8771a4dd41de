//! Dialer Domain Library
//!
//! Core domain types and interfaces for the Dialer call dispatch engine.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure business entities and logic
//!   - `entities/`: Core domain models (Call, CallPatch)
//!   - `value_objects/`: Immutable value types (CallStatus, ProviderOutcome, Pagination)
//!   - `services/`: Pure policies (retry backoff, dispatch failure classification)
//!   - `errors/`: Domain-specific error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `repositories/`: Call record store
//!   - `services/`: External call-initiation provider
//!
//! # Usage
//!
//! ```rust,ignore
//! use dialer::{Call, CallStatus, RetryPolicy};
//! use dialer::{CallRepository, CallInitiator};
//! ```

pub mod domain;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    validate_destination, validate_metadata, validate_script_id, Call, CallPatch, CallStatus,
    DispatchFailure, DomainError, FailureKind, Page, PageRequest, ProviderOutcome, RetryDecision,
    RetryPolicy, StatusCounts, ABANDONED_DISPATCH,
};
pub use ports::{
    // Repositories
    CallRepository,
    // Provider
    CallInitiator,
    InitiateCallRequest,
    InitiatedCall,
};
