//! Accept loop and process-wide shutdown.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::engine::MetricsEngine;
use crate::server::Session;

/// Owns the listening socket. Each accepted connection gets its own
/// spawned [`Session`]; the listener holds no business state beyond the
/// shared engine handle.
pub struct MetricsServer {
    listener: TcpListener,
    engine: Arc<MetricsEngine>,
}

impl MetricsServer {
    /// Bind the configured address. This is the only fatal startup error
    /// in normal operation.
    pub async fn bind(config: &ServerConfig, engine: Arc<MetricsEngine>) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr()).await?;
        Ok(MetricsServer { listener, engine })
    }

    /// Address actually bound; useful when configured with port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until Ctrl-C.
    ///
    /// Shutdown policy is abrupt by choice: the listener stops accepting
    /// and returns, and in-flight sessions are dropped when the process
    /// exits rather than drained.
    pub async fn run(self) -> io::Result<()> {
        info!(addr = %self.listener.local_addr()?, "metrics server listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let engine = self.engine.clone();
                        tokio::spawn(async move {
                            Session::new(stream, engine, peer_addr).run().await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, closing listener");
                    break;
                }
            }
        }
        Ok(())
    }
}
