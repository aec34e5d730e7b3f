pub mod replay;
pub mod watch;

use tokio::sync::broadcast;

/// Ctrl-C publishes on the shutdown broadcast; every pipeline task
/// observes it and winds down in order.
pub fn spawn_signal_handler(shutdown: broadcast::Sender<()>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, shutting down");
                let _ = shutdown.send(());
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        }
    });
}
