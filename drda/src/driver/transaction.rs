//! Transaction control: begin/commit/rollback plus retry and timeout helpers.

use super::connection::Connection;
use super::pool::{Factory, Pooled};
use super::{DrdaError, DrdaResult};
use crate::config::IsolationLevel;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Anything that can run a statement and report affected rows.
#[async_trait]
pub trait TransactionTarget: Send {
    async fn execute_command(&mut self, sql: &str) -> DrdaResult<u64>;

    /// Isolation level configured for this target, if any.
    fn default_isolation(&self) -> Option<IsolationLevel> {
        None
    }
}

#[async_trait]
impl TransactionTarget for Connection {
    async fn execute_command(&mut self, sql: &str) -> DrdaResult<u64> {
        Connection::execute_command(self, sql).await
    }

    fn default_isolation(&self) -> Option<IsolationLevel> {
        self.config().isolation_level
    }
}

#[async_trait]
impl<T: TransactionTarget + ?Sized> TransactionTarget for &mut T {
    async fn execute_command(&mut self, sql: &str) -> DrdaResult<u64> {
        (**self).execute_command(sql).await
    }

    fn default_isolation(&self) -> Option<IsolationLevel> {
        (**self).default_isolation()
    }
}

#[async_trait]
impl<F> TransactionTarget for Pooled<F>
where
    F: Factory,
    F::Resource: TransactionTarget,
{
    async fn execute_command(&mut self, sql: &str) -> DrdaResult<u64> {
        (**self).execute_command(sql).await
    }

    fn default_isolation(&self) -> Option<IsolationLevel> {
        (**self).default_isolation()
    }
}

/// At most one active transaction over a target.
///
/// # Example
/// ```ignore
/// let mut tx = TransactionManager::new(&mut conn);
/// tx.begin_transaction(Some(IsolationLevel::Serializable)).await?;
/// tx.target().execute_command("UPDATE t SET n = n + 1").await?;
/// tx.commit_transaction().await?;
/// ```
pub struct TransactionManager<T: TransactionTarget> {
    target: T,
    active: Option<IsolationLevel>,
}

impl<T: TransactionTarget> TransactionManager<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            active: None,
        }
    }

    /// Set the isolation level, then BEGIN. Isolation defaults to the
    /// target's configured level, else READ COMMITTED. A begin while a
    /// transaction is active does nothing.
    pub async fn begin_transaction(&mut self, isolation: Option<IsolationLevel>) -> DrdaResult<()> {
        if let Some(current) = self.active {
            tracing::warn!(isolation = %current, "transaction already active; begin ignored");
            return Ok(());
        }
        let level = isolation
            .or_else(|| self.target.default_isolation())
            .unwrap_or_default();
        self.target
            .execute_command(&format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()))
            .await?;
        self.target.execute_command("BEGIN").await?;
        tracing::debug!(isolation = %level, "transaction started");
        self.active = Some(level);
        Ok(())
    }

    pub async fn commit_transaction(&mut self) -> DrdaResult<()> {
        self.finish("COMMIT").await
    }

    pub async fn rollback_transaction(&mut self) -> DrdaResult<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, command: &str) -> DrdaResult<()> {
        if self.active.is_none() {
            return Err(DrdaError::NoActiveTransaction);
        }
        self.target.execute_command(command).await?;
        tracing::debug!(command, "transaction finished");
        self.active = None;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Isolation level of the active transaction.
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.active
    }

    pub fn target(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }

    /// Run `op` up to `attempts` times, sleeping `delay` between tries.
    /// Returns the last error once attempts run out.
    pub async fn retry_operation<R, Fut, Op>(
        mut op: Op,
        attempts: usize,
        delay: Duration,
    ) -> DrdaResult<R>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = DrdaResult<R>>,
    {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "operation failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Race `fut` against a timer. The timer is dropped with the race.
    pub async fn with_timeout<R, Fut>(fut: Fut, timeout: Duration) -> DrdaResult<R>
    where
        Fut: Future<Output = DrdaResult<R>>,
    {
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DrdaError::Timeout(timeout)),
        }
    }
}
