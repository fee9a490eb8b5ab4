//! TCP accept loop: binds the listener and spawns one [`ConnectionHandler`]
//! task per accepted connection.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ExpiryPolicy;
use crate::error::AggregatorError;
use crate::storage::RecordStore;
use weather_core::Clock;

use super::handler::ConnectionHandler;

/// Binds `0.0.0.0:<port>` and serves connections until `shutdown` fires.
///
/// # Errors
///
/// Returns [`AggregatorError::Bind`] if the port cannot be bound.
pub async fn serve(
    port: u16,
    store: Arc<RecordStore>,
    clock: Arc<Clock>,
    policy: ExpiryPolicy,
    shutdown: Arc<tokio::sync::Notify>,
) -> Result<(), AggregatorError> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|source| AggregatorError::Bind { port, source })?;
    tracing::info!(port, "aggregator listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let handler = ConnectionHandler::new(
                            Arc::clone(&store),
                            Arc::clone(&clock),
                            policy,
                            peer_addr.ip().to_string(),
                            peer_addr.port(),
                        );
                        tokio::spawn(async move {
                            handler.run(stream).await;
                        });
                    }
                    Err(error) => {
                        tracing::warn!(%error, "failed to accept connection");
                    }
                }
            }
            () = shutdown.notified() => {
                tracing::info!("accept loop shutting down");
                break;
            }
        }
    }
    Ok(())
}
