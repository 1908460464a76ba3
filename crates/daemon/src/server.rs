//! Shell lifecycle

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::api::{router, ApiState};
use crate::{DaemonError, Result};

/// Bind `address` and serve until `shutdown` resolves
pub async fn serve<F>(address: &str, state: ApiState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
        DaemonError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })?;
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, state, shutdown).await
}

/// Serve on an already bound listener.
///
/// Once `shutdown` resolves and in-flight requests finish, every live
/// session is deregistered from its relay.
pub async fn serve_listener<F>(listener: TcpListener, state: ApiState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry().clone();
    info!("HTTP shell listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    let released = registry.shutdown().await;
    info!("HTTP shell stopped, released {} sessions", released);
    Ok(())
}
