//! OastBeacon Core Types
//!
//! Session identifiers, lifecycle states and callback-domain naming shared by
//! every OastBeacon crate. Nothing in here talks to the network.

mod naming;
mod record;
mod session;

pub use naming::*;
pub use record::*;
pub use session::*;
