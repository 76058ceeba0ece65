// Server loop module
// Accepts connections until shutdown, reloading the manifest on request

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run the accept loop until the shutdown signal fires.
///
/// A reload signal re-reads the manifest; on failure the active
/// deployment keeps serving. On shutdown the listener is closed and
/// in-flight connections get up to `performance.shutdown_timeout`
/// seconds to finish.
pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let addr = listener.local_addr()?;

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &shutdown_rx,
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = signals.reload.notified() => {
                logger::log_info(&format!(
                    "Reloading manifest {}",
                    state.config.deploy.manifest_path
                ));
                if let Err(e) = state.reload_deployment().await {
                    logger::log_error(&format!(
                        "Manifest reload failed, keeping active deployment: {e}"
                    ));
                }
            }

            () = signals.shutdown.notified() => {
                logger::log_info(&format!("Shutting down listener on {addr}"));
                break;
            }
        }
    }

    drop(listener);
    shutdown_tx.send_replace(true);

    let grace = Duration::from_secs(state.config.performance.shutdown_timeout);
    if drain_connections(&active_connections, grace).await {
        logger::log_info("All connections closed");
    } else {
        logger::log_warning(&format!(
            "{} connection(s) still open after {} seconds, exiting",
            active_connections.load(Ordering::SeqCst),
            grace.as_secs()
        ));
    }

    Ok(())
}

/// Wait until no connection is active; `false` if `grace` runs out first
async fn drain_connections(active: &AtomicUsize, grace: Duration) -> bool {
    let drained = async {
        while active.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(grace, drained).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::manifest::{BuildDescriptor, Manifest, RouteRule};
    use crate::routing::Deployment;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_state() -> Arc<AppState> {
        let mut config = Config::default_settings().unwrap();
        config.logging.access_log = false;
        config.performance.shutdown_timeout = 5;
        let manifest = Manifest {
            builds: vec![BuildDescriptor::new("app.py", "@vercel/python")],
            routes: vec![RouteRule::new("/(.*)", "app.py")],
            ..Manifest::default()
        };
        Arc::new(AppState::new(&config, Deployment::new(manifest).unwrap()))
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let state = test_state();
        let signals = Arc::new(SignalHandler::new());

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let server = tokio::task::spawn_local(run_server(
                    listener,
                    state,
                    Arc::clone(&signals),
                ));

                let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(b"GET /history HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).await.unwrap();
                assert!(response.starts_with("HTTP/1.1 401"), "{response}");

                signals.shutdown.notify_one();
                server.await.unwrap().unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_request_finish() {
        let state = test_state();
        let signals = Arc::new(SignalHandler::new());

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let form = b"username=Kelsier&password=Gondal";
        let head = format!(
            "POST /login HTTP/1.1\r\nHost: localhost\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\n\r\n",
            form.len()
        );

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let server = tokio::task::spawn_local(run_server(
                    listener,
                    state,
                    Arc::clone(&signals),
                ));

                // Headers and part of the body arrive before shutdown
                let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                stream.write_all(head.as_bytes()).await.unwrap();
                stream.write_all(&form[..4]).await.unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;

                signals.shutdown.notify_one();
                tokio::time::sleep(Duration::from_millis(100)).await;
                assert!(!server.is_finished());

                stream.write_all(&form[4..]).await.unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).await.unwrap();
                assert!(response.starts_with("HTTP/1.1 200"), "{response}");
                assert!(response.contains("\"success\":true"), "{response}");

                server.await.unwrap().unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let active = AtomicUsize::new(1);
        assert!(!drain_connections(&active, Duration::from_millis(50)).await);
        active.store(0, Ordering::SeqCst);
        assert!(drain_connections(&active, Duration::from_millis(50)).await);
    }
}
