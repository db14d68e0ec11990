//! Pooled connections with a manager-level state machine and health report.

use super::connection::Connection;
use super::pool::{Factory, PoolError, PoolEvent, PoolStats, Pooled, ResourcePool};
use super::state::{ConnectionState, StateMachine};
use super::stream::DrdaStream;
use super::{DrdaError, DrdaResult};
use crate::auth::{AuthStrategy, strategy_for};
use crate::config::{ConnectionConfig, PoolConfig};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Supplies the transport for new connections in place of TCP/TLS.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, config: &ConnectionConfig) -> DrdaResult<DrdaStream>;
}

/// Opens, validates and closes [`Connection`]s for the pool.
pub struct ConnectionFactory {
    config: Arc<ConnectionConfig>,
    auth: Arc<dyn AuthStrategy>,
    connector: Option<Arc<dyn Connector>>,
}

impl ConnectionFactory {
    pub fn new(config: Arc<ConnectionConfig>, auth: Arc<dyn AuthStrategy>) -> Self {
        Self {
            config,
            auth,
            connector: None,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }
}

#[async_trait]
impl Factory for ConnectionFactory {
    type Resource = Connection;
    type Error = DrdaError;

    async fn create(&self) -> DrdaResult<Connection> {
        let mut conn = Connection::new(Arc::clone(&self.config), Arc::clone(&self.auth));
        match &self.connector {
            Some(connector) => {
                let stream = connector.connect(&self.config).await?;
                conn.open_with_stream(stream).await?;
            }
            None => conn.open().await?,
        }
        Ok(conn)
    }

    async fn destroy(&self, mut conn: Connection) -> DrdaResult<()> {
        conn.close().await
    }

    fn validate(&self, conn: &Connection) -> bool {
        conn.is_usable()
    }
}

pub type PooledConnection = Pooled<ConnectionFactory>;

/// Point-in-time view of the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub state: ConnectionState,
    /// Idle plus in-use connections.
    pub active_connections: usize,
    pub in_use: usize,
    pub idle: usize,
    pub waiting: usize,
    pub healthy: bool,
}

/// # Example
/// ```ignore
/// let manager = ConnectionManager::new(config, PoolConfig::new(2, 10))?;
/// manager.initialize().await?;
/// let mut conn = manager.acquire().await?;
/// let result = conn.query("SELECT 1 FROM SYSIBM.SYSDUMMY1", &[]).await?;
/// manager.release(conn);
/// assert!(manager.health().healthy);
/// manager.close().await?;
/// ```
pub struct ConnectionManager {
    config: Arc<ConnectionConfig>,
    pool: ResourcePool<ConnectionFactory>,
    state: Mutex<StateMachine>,
}

impl ConnectionManager {
    /// Validates both configurations; nothing is opened until
    /// `initialize()` or the pool's first sweep.
    pub fn new(config: ConnectionConfig, pool_config: PoolConfig) -> DrdaResult<Self> {
        Self::build(config, pool_config, None)
    }

    pub fn with_connector(
        config: ConnectionConfig,
        pool_config: PoolConfig,
        connector: Arc<dyn Connector>,
    ) -> DrdaResult<Self> {
        Self::build(config, pool_config, Some(connector))
    }

    fn build(
        config: ConnectionConfig,
        pool_config: PoolConfig,
        connector: Option<Arc<dyn Connector>>,
    ) -> DrdaResult<Self> {
        config.validate()?;
        pool_config.validate()?;
        let auth = match &config.auth {
            Some(auth) => strategy_for(auth),
            None => return Err(DrdaError::Config("missing auth".to_string())),
        };
        let config = Arc::new(config);
        let mut factory = ConnectionFactory::new(Arc::clone(&config), auth);
        if let Some(connector) = connector {
            factory = factory.with_connector(connector);
        }
        Ok(Self {
            config,
            pool: ResourcePool::new(factory, pool_config),
            state: Mutex::new(StateMachine::new("manager")),
        })
    }

    fn machine(&self) -> MutexGuard<'_, StateMachine> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.machine().state()
    }

    /// Open `min_pool_size` connections and move to CONNECTED. With a
    /// non-zero minimum, failing to open any lands in ERROR.
    pub async fn initialize(&self) -> DrdaResult<()> {
        if !self.machine().transition(ConnectionState::Initializing) {
            return Err(DrdaError::Connection(format!(
                "cannot initialize manager in state {}",
                self.state()
            )));
        }

        let created = self.pool.fill().await;
        let min = self.pool.config().min_pool_size;
        if min > 0 && self.active_connections() == 0 {
            self.machine().fail();
            return Err(DrdaError::Connection(format!(
                "could not open any of {} connections to {}:{}",
                min, self.config.host, self.config.port
            )));
        }

        self.machine()
            .transition_path(&[ConnectionState::Connecting, ConnectionState::Connected]);
        tracing::info!(created, min, "connection manager ready");
        Ok(())
    }

    /// Check out a connection.
    pub async fn acquire(&self) -> DrdaResult<PooledConnection> {
        let state = self.state();
        if state != ConnectionState::Connected {
            return Err(DrdaError::NotConnected(state));
        }
        self.pool.acquire().await.map_err(|e| match e {
            PoolError::Create(source) => match source.downcast::<DrdaError>() {
                Ok(err) => *err,
                Err(other) => DrdaError::Pool(PoolError::Create(other)),
            },
            other => DrdaError::Pool(other),
        })
    }

    /// Return a connection; same as dropping it.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Live connections, idle or in use.
    pub fn active_connections(&self) -> usize {
        let stats = self.pool.stats();
        stats.idle + stats.in_use
    }

    pub fn health(&self) -> HealthReport {
        let stats = self.pool.stats();
        let state = self.state();
        let active_connections = stats.idle + stats.in_use;
        HealthReport {
            state,
            active_connections,
            in_use: stats.in_use,
            idle: stats.idle,
            waiting: stats.waiting,
            healthy: state == ConnectionState::Connected && active_connections > 0,
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.pool.subscribe()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Drain the pool. Waits until connections still checked out are
    /// released and closed.
    pub async fn close(&self) -> DrdaResult<()> {
        let state = self.state();
        match state {
            ConnectionState::Connected => {
                self.machine().transition(ConnectionState::Disconnecting);
            }
            ConnectionState::Error => {}
            _ => {
                self.pool.drain().await;
                return Ok(());
            }
        }
        self.pool.drain().await;
        self.machine().transition(ConnectionState::Disconnected);
        tracing::info!("connection manager closed");
        Ok(())
    }
}
