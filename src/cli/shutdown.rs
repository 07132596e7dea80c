use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancelation` on Ctrl-C. Returns early if something else cancels first.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C {e:?}");
                cancelation.cancelled().await;
                return;
            }
            info!("Received Ctrl-C, shutting down");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
