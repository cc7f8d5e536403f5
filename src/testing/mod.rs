//! Testing utilities and mock implementations
//!
//! Lets the connection manager and observers be exercised without a broker.

pub mod mocks;

pub use mocks::*;
