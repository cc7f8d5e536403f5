//! TLS identity loading for broker connections

pub mod identity;
pub mod material;

pub use identity::{build_secure_transport, parse_private_key, IdentityError, SecureTransport};
pub use material::{TlsMaterial, TlsMaterialSource};
