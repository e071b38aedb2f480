//! Server module - GOPROXY protocol over HTTP/1
//!
//! Provides:
//! - route: request paths to operations
//! - handler: operations to responses, request logging
//! - metrics: counters exposed at `/metrics`

pub mod handler;
pub mod metrics;
pub mod route;

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::core::config::ProxyConfig;
use crate::ops::dispatch::Dispatch;

/// Start the proxy and serve until SIGINT or SIGTERM
pub async fn run(config: ProxyConfig) -> Result<()> {
    let dispatch = Arc::new(Dispatch::from_config(&config).await?);

    let listener =
        TcpListener::bind(config.listen).with_context(|| format!("binding {}", config.listen))?;
    listener
        .set_nonblocking(true)
        .context("configuring listener")?;
    info!(
        addr = %listener.local_addr().context("reading listen address")?,
        mode = dispatch.ops.mode(),
        "listening"
    );

    serve(listener, dispatch, shutdown_signal(), config.shutdown_grace).await
}

/// Serve on `listener` until `shutdown` resolves, then drain for at most `grace`
pub async fn serve(
    listener: TcpListener,
    dispatch: Arc<Dispatch>,
    shutdown: impl Future<Output = ()>,
    grace: Duration,
) -> Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let dispatch = dispatch.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handler::handle(dispatch.clone(), req)))
        }
    });

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = Server::from_tcp(listener)
        .context("starting server")?
        .serve(make_svc)
        .with_graceful_shutdown(async {
            let _ = stop_rx.await;
        });
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.context("serving"),
        _ = shutdown => {}
    }

    info!("shutting down");
    let _ = stop_tx.send(());
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.context("serving"),
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "in-flight requests aborted");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
