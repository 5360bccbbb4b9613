use std::future::{Future, IntoFuture};
use std::io;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(#[source] io::Error),

    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    SigTerm(#[source] io::Error),
}

/// Resolve once Ctrl+C or SIGTERM arrives.
pub async fn wait_for_signal() -> Result<(), ShutdownSignalError> {
    let ctrl_c = async { signal::ctrl_c().await.map_err(ShutdownSignalError::CtrlC) };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ShutdownSignalError::SigTerm)?
            .recv()
            .await;
        Ok::<(), ShutdownSignalError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), ShutdownSignalError>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!(target = "listings::shutdown", "ctrl_c signal received");
        }
        result = terminate => {
            result?;
            info!(target = "listings::shutdown", "terminate signal received");
        }
    }

    Ok(())
}

/// Serve `router` until `signal` resolves, then let open requests finish for
/// at most `grace`.
///
/// Returns the shutdown deadline when the signal was observed before the
/// server finished, so later teardown can share the same budget.
pub async fn serve_with_grace<S>(
    listener: TcpListener,
    router: Router,
    signal: S,
    grace: Duration,
) -> io::Result<Option<Instant>>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (deadline_tx, deadline_rx) = oneshot::channel();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = deadline_tx.send(Instant::now() + grace);
        })
        .into_future();
    tokio::pin!(server);

    let deadline = tokio::select! {
        biased;
        result = &mut server => return result.map(|()| None),
        deadline = deadline_rx => match deadline {
            Ok(deadline) => deadline,
            Err(_) => return server.await.map(|()| None),
        },
    };

    match tokio::time::timeout_at(deadline, &mut server).await {
        Ok(result) => result.map(|()| Some(deadline)),
        Err(_) => {
            warn!(
                target = "listings::shutdown",
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "HTTP connections still open at shutdown deadline; closing them"
            );
            Ok(Some(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::routing::get;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn stuck_request_cannot_hold_shutdown_past_the_grace_period() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let entered = Arc::new(Notify::new());
        let router = Router::new().route(
            "/stall",
            get({
                let entered = Arc::clone(&entered);
                move || async move {
                    entered.notify_one();
                    std::future::pending::<()>().await;
                    "never"
                }
            }),
        );

        let (trigger, signal) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_with_grace(
            listener,
            router,
            async {
                let _ = signal.await;
            },
            Duration::from_millis(200),
        ));

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client
            .write_all(b"GET /stall HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .expect("send request");
        entered.notified().await;

        trigger.send(()).expect("server listening for the signal");
        let stopped = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server stopped at the deadline")
            .expect("join")
            .expect("serve");
        assert!(stopped.is_some());
    }

    #[tokio::test]
    async fn idle_server_stops_without_waiting_out_the_grace_period() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");

        tokio::time::timeout(
            Duration::from_secs(5),
            serve_with_grace(listener, Router::new(), async {}, Duration::from_secs(30)),
        )
        .await
        .expect("stopped before the grace period")
        .expect("serve");
    }
}
