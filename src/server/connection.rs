// Connection handling module
// Accepts a single TCP connection and serves it over HTTP/1.1

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept a connection, enforcing `max_connections`.
///
/// Must be called from within a `LocalSet`. The connection finishes its
/// in-flight request and closes once `shutdown` flips to `true`.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    shutdown: &watch::Receiver<bool>,
) {
    // Increment first, then check, so concurrent accepts cannot overshoot
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    if state.access_log_enabled() {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        shutdown.clone(),
    );
}

/// Serve one connection in a local task, decrementing the counter when done
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let performance = &state.config.performance;
        let timeout_duration = Duration::from_secs(std::cmp::max(
            performance.read_timeout,
            performance.write_timeout,
        ));

        let mut builder = http1::Builder::new();
        builder.keep_alive(performance.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req: Request<Incoming>| {
                handler::handle_request(req, Arc::clone(&service_state), peer_addr)
            }),
        );
        tokio::pin!(conn);

        let served = async {
            let mut draining = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => break result,
                    changed = shutdown.changed(), if !draining => {
                        // A dropped sender also means the server is going away
                        if changed.is_err() || *shutdown.borrow() {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                    }
                }
            }
        };

        match tokio::time::timeout(timeout_duration, served).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_warning(&format!(
                "Connection from {peer_addr} timed out after {} seconds",
                timeout_duration.as_secs()
            )),
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::manifest::{BuildDescriptor, Manifest, RouteRule};
    use crate::routing::Deployment;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    fn limited_state(max_connections: u64) -> Arc<AppState> {
        let mut config = Config::default_settings().unwrap();
        config.logging.access_log = false;
        config.performance.max_connections = Some(max_connections);
        let manifest = Manifest {
            builds: vec![BuildDescriptor::new("app.py", "@vercel/python")],
            routes: vec![RouteRule::new("/(.*)", "app.py")],
            ..Manifest::default()
        };
        Arc::new(AppState::new(&config, Deployment::new(manifest).unwrap()))
    }

    #[tokio::test]
    async fn test_max_connections_rejects_and_rolls_back() {
        let state = limited_state(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                // First connection is held open without sending a request
                let _held = TcpStream::connect(addr).await.unwrap();
                let (stream, peer) = listener.accept().await.unwrap();
                accept_connection(stream, peer, &state, &counter, &shutdown_rx);
                assert_eq!(counter.load(Ordering::SeqCst), 1);

                let mut rejected = TcpStream::connect(addr).await.unwrap();
                let (stream, peer) = listener.accept().await.unwrap();
                accept_connection(stream, peer, &state, &counter, &shutdown_rx);
                assert_eq!(counter.load(Ordering::SeqCst), 1);

                let mut buf = Vec::new();
                let read = rejected.read_to_end(&mut buf).await;
                assert!(matches!(read, Ok(0) | Err(_)), "{read:?}");
                assert_eq!(counter.load(Ordering::SeqCst), 1);
            })
            .await;
    }
}
