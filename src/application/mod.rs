//! Application layer containing the core business logic orchestration.
//!
//! This module defines the `OwnershipEngine`, the single entry point through
//! which all registry and sub-ledger mutations flow. Operations execute
//! sequentially to completion; the only concurrency hazard is synchronous
//! reentrancy through the payment gateway, which the engine guards against.

pub mod engine;
