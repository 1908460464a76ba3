//! OastBeacon Daemon
//!
//! Local HTTP shell over [`oastbeacon_client`] for browser frontends and
//! scripts.
//!
//! ## Routes
//!
//! - `POST /api/register` - open a relay session, returns its token and domain
//! - `GET /api/poll?id=<token>` - decrypted interactions since the last poll
//! - `POST /api/deregister` - release a session
//! - `GET /api/domain?id=<token>` - callback domain for a session
//! - `GET /health` - liveness and session count
//!
//! Sessions live in a [`SessionRegistry`](oastbeacon_client::SessionRegistry)
//! injected as router state.

mod api;
mod server;

pub use api::{router, ApiError, ApiState, RegisterBody};
pub use server::{serve, serve_listener};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Invalid bind address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
