use perf_harness_core::prelude::ShutdownHandle;
use tokio::signal;

/// Trigger `handle` on Ctrl-C. Must be called from within a Tokio runtime.
pub fn start_shutdown_listener(handle: &ShutdownHandle) {
    let listener_handle = handle.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                listener_handle.shutdown();
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
        }
    });
}
