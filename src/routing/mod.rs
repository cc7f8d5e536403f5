//! Inbound message routing
//!
//! [`TopicRouter`] turns `(topic, payload)` pairs from the broker into
//! alarm events and command responses, or a [`DropReason`].

pub mod router;

pub use router::{DropReason, RouteOutcome, TopicRouter};
