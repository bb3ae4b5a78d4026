//! Domain entities and the ports through which the engine reaches storage
//! and the external payment gateway.

pub mod holding;
pub mod ports;
pub mod property;
