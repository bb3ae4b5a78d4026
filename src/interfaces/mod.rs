//! Inbound and outbound adapters around the engine.

pub mod csv;
