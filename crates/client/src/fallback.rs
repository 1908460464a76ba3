//! Registration across a list of relays

use tracing::{info, warn};

use crate::{ClientError, InteractionClient, Registration, Result};

/// Register with the first relay in `servers` that accepts the session.
///
/// `make_client` builds an unregistered client for a host. Each host is tried
/// once, in order; the last failure is returned if none accept.
pub async fn register_with_fallback<F>(
    servers: &[String],
    mut make_client: F,
) -> Result<(InteractionClient, Registration)>
where
    F: FnMut(&str) -> Result<InteractionClient>,
{
    let mut last_error = ClientError::NoRelays;

    for server in servers {
        let mut client = match make_client(server) {
            Ok(client) => client,
            Err(e) => {
                warn!("Skipping relay {}: {}", server, e);
                last_error = e;
                continue;
            }
        };

        match client.register().await {
            Ok(registration) => {
                info!("Registered with relay {}", server);
                return Ok((client, registration));
            }
            Err(e) => {
                warn!("Relay {} refused registration: {}", server, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}
