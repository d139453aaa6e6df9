//! `Broker`: TCP listener and accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use swergio_core::ConnectionId;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::connection::BrokerConnection;
use crate::errors::{BrokerError, Result};
use crate::metrics::{CONNECTIONS_ACTIVE, CONNECTIONS_REJECTED_TOTAL, CONNECTIONS_TOTAL};
use crate::registry::RoomRegistry;
use crate::session::run_connection;
use crate::shutdown::ShutdownCoordinator;

/// The swergio broker: accepts component connections and relays frames
/// between room members.
pub struct Broker {
    listener: TcpListener,
    config: BrokerConfig,
    registry: Arc<RoomRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Broker {
    /// Bind the listening socket.
    pub async fn bind(config: BrokerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| BrokerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!(
            addr = %config.bind_addr,
            header_len = config.frame.header_len,
            max_connections = config.max_connections,
            "broker listening"
        );
        Ok(Self {
            listener,
            config,
            registry: Arc::new(RoomRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Address actually bound (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Room membership tables.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Shutdown coordinator. Call `shutdown()` on it to stop [`run`](Self::run).
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Broker configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Wait for one connection and spawn its task.
    ///
    /// Returns `None` when the connection was refused because the limit is
    /// reached; the socket is closed immediately.
    pub async fn accept(&self) -> Result<Option<ConnectionId>> {
        let (stream, peer) = self.listener.accept().await?;

        if self.registry.connection_count() >= self.config.max_connections {
            warn!(
                peer = %peer,
                limit = self.config.max_connections,
                "connection limit reached, refusing"
            );
            counter!(CONNECTIONS_REJECTED_TOTAL).increment(1);
            drop(stream);
            return Ok(None);
        }

        let _ = stream.set_nodelay(true);
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(BrokerConnection::new(id.clone(), peer, tx, self.config.outbound_buffer));
        self.registry.register(connection.clone());
        counter!(CONNECTIONS_TOTAL).increment(1);
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);

        let registry = self.registry.clone();
        let frame = self.config.frame;
        let cancel = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let _ = run_connection(stream, connection, rx, registry, frame, cancel).await;
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
        Ok(Some(id))
    }

    /// Accept connections until shutdown, then wait for connection tasks.
    pub async fn run(&self) -> Result<()> {
        let token = self.shutdown.token();
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                accepted = self.accept() => {
                    // transient accept errors (e.g. fd exhaustion) must not kill the broker
                    if let Err(e) = accepted {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
        }

        info!("broker shutting down");
        let handles = std::mem::take(&mut *self.tasks.lock());
        let _ = self
            .shutdown
            .graceful_shutdown(handles, self.config.shutdown_timeout)
            .await;
        info!("broker stopped");
        Ok(())
    }
}
