//! Sensor hub message types, topics and payload codec
//!
//! This module defines the wire-level vocabulary shared by the router, the
//! connection manager and command publishers.

pub mod codec;
pub mod messages;
pub mod topics;

pub use codec::{DecodeError, MessageCodec};
pub use messages::*;
pub use topics::*;
