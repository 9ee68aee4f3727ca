//! Server assembly: configuration, shared context, routes, and the
//! lifecycle handle with graceful shutdown.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::Reply;
use warp::Filter;

use crate::persist::{HandHistorySink, MemoryHandHistory, MemorySnapshotStore, SnapshotSink};
use crate::registry::{GameRegistry, InMemoryRegistry};
use crate::session::SessionManager;
use crate::settings::Timing;
use crate::table::{TableCmd, TableDeps, Tables};
use crate::ws;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind address: {0}")]
    Bind(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Shared collaborators behind every connection and table task.
#[derive(Clone)]
pub struct AppContext {
    pub config: ServerConfig,
    pub sessions: Arc<SessionManager>,
    pub registry: Arc<dyn GameRegistry>,
    pub snapshots: Arc<dyn SnapshotSink>,
    pub history: Arc<dyn HandHistorySink>,
    pub tables: Arc<Tables>,
    pub timing: Timing,
}

impl AppContext {
    /// In-memory collaborators throughout; the binary swaps in durable
    /// sinks where configured.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryRegistry::new()),
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(MemoryHandHistory::new()),
            Timing::from_env(),
        )
    }

    pub fn with_collaborators(
        config: ServerConfig,
        registry: Arc<dyn GameRegistry>,
        snapshots: Arc<dyn SnapshotSink>,
        history: Arc<dyn HandHistorySink>,
        timing: Timing,
    ) -> Self {
        Self {
            config,
            sessions: Arc::new(SessionManager::new()),
            registry,
            snapshots,
            history,
            tables: Arc::new(Tables::new()),
            timing,
        }
    }

    pub fn new_for_tests() -> Self {
        let mut ctx = Self::new(ServerConfig::for_tests());
        ctx.timing = Timing::for_tests();
        ctx
    }

    pub fn table_deps(&self) -> TableDeps {
        TableDeps {
            sessions: Arc::clone(&self.sessions),
            registry: Arc::clone(&self.registry),
            snapshots: Arc::clone(&self.snapshots),
            history: Arc::clone(&self.history),
            timing: self.timing.clone(),
        }
    }
}

pub struct GameServer {
    context: AppContext,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            context: AppContext::new(config),
        }
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let context = self.context;
        let bind_addr = Self::bind_addr(&context.config)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(|err| ServerError::Config(err.to_string()))?;

        tracing::info!(address = %addr, "game server listening");
        let task = tokio::spawn(server_future);

        Ok(ServerHandle {
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            context,
        })
    }

    fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let health = warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| warp::reply::json(&serde_json::json!({"status": "ok"})).into_response());

        let ctx = context.clone();
        let game_socket = warp::path("ws")
            .and(warp::path::end())
            .and(warp::ws())
            .map(move |upgrade: warp::ws::Ws| {
                let ctx = ctx.clone();
                upgrade
                    .on_upgrade(move |socket| ws::handle_socket(socket, ctx))
                    .into_response()
            });

        health.or(game_socket).unify().boxed()
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();
        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }
        let candidate = format!("{}:{}", host, config.port());
        candidate
            .to_socket_addrs()
            .map_err(|err| ServerError::Config(format!("cannot resolve `{candidate}`: {err}")))?
            .next()
            .ok_or_else(|| ServerError::Config(format!("cannot resolve `{candidate}`")))
    }
}

pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    context: AppContext,
}

impl ServerHandle {
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Graceful stop: every table flushes a final snapshot and halts,
    /// then the listener drains.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        for table in self.context.tables.all() {
            table.send(TableCmd::Shutdown { reason: None });
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|err| ServerError::Config(format!("server task join error: {err}")))?;
        }
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
