//! Explicitly constructed application context.

use crate::config::Settings;
use crate::error::Result;
use drda_client::{ConnectionManager, HealthReport, PooledConnection};

/// Settings plus the pool built from them. Pass it by reference to whatever
/// needs a connection.
pub struct DrdaContext {
    settings: Settings,
    manager: ConnectionManager,
}

impl DrdaContext {
    /// Validates the settings; nothing is opened until [`connect`](Self::connect).
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let manager =
            ConnectionManager::new(settings.connection.clone(), settings.pool.clone())?;
        Ok(Self { settings, manager })
    }

    pub async fn connect(&self) -> Result<()> {
        self.manager.initialize().await?;
        tracing::info!(
            host = %self.settings.connection.host,
            database = %self.settings.connection.database,
            connections = self.manager.active_connections(),
            "connected"
        );
        Ok(())
    }

    pub async fn acquire(&self) -> Result<PooledConnection> {
        Ok(self.manager.acquire().await?)
    }

    pub fn health(&self) -> HealthReport {
        self.manager.health()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.manager.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use drda_client::{ConnectionConfig, ConnectionState, DrdaError, PoolConfig};

    fn settings() -> Settings {
        Settings {
            connection: ConnectionConfig::new("db.example.com", 50000, "SAMPLE")
                .password("db2inst1", "secret"),
            pool: PoolConfig::new(1, 4),
        }
    }

    #[test]
    fn test_new_does_not_connect() {
        let ctx = DrdaContext::new(settings()).unwrap();
        assert_eq!(ctx.health().state, ConnectionState::Disconnected);
        assert_eq!(ctx.health().active_connections, 0);
        assert_eq!(ctx.settings().pool.max_pool_size, 4);
    }

    #[test]
    fn test_invalid_pool_rejected() {
        let mut settings = settings();
        settings.pool = PoolConfig::new(5, 2);
        assert!(matches!(
            DrdaContext::new(settings),
            Err(Error::Drda(DrdaError::Config(_)))
        ));
    }

    #[tokio::test]
    async fn test_acquire_before_connect() {
        let ctx = DrdaContext::new(settings()).unwrap();
        assert!(matches!(
            ctx.acquire().await,
            Err(Error::Drda(DrdaError::NotConnected(ConnectionState::Disconnected)))
        ));
    }
}
