//! Prepared statements and the per-connection statement cache.

use super::connection::Connection;
use super::query::{QueryResult, into_result, into_status, sql_error, unexpected};
use super::DrdaResult;
use crate::protocol::{DrdaEncoder, Reply, Value};

/// Server-side statement handle.
///
/// # Example
/// ```ignore
/// let stmt = conn.prepare("SELECT name FROM users WHERE id = ?").await?;
/// for id in 1..10i64 {
///     conn.execute_prepared_statement(&stmt, &[id.into()]).await?;
/// }
/// stmt.close(&mut conn).await?;
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedStatement {
    pub(crate) handle: u16,
    pub(crate) sql: String,
}

impl PreparedStatement {
    pub fn handle(&self) -> u16 {
        self.handle
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Release the server-side statement.
    pub async fn close(self, conn: &mut Connection) -> DrdaResult<()> {
        conn.close_statement(self.handle).await
    }
}

impl Connection {
    /// PRPSQLSTT; the reply carries the statement handle.
    pub async fn prepare(&mut self, sql: &str) -> DrdaResult<PreparedStatement> {
        self.ensure_connected()?;
        let frame = self.exchange(|corr| DrdaEncoder::prepare(corr, sql)).await?;
        let result = match Reply::decode(&frame) {
            Ok(Reply::Prepared { handle }) => Ok(handle),
            Ok(Reply::Status(card)) if card.is_error() => Err(sql_error(card)),
            Ok(_) => Err(unexpected("SQLDARD", &frame)),
            Err(e) => Err(e.into()),
        };
        let handle = self.settle(result)?;
        tracing::debug!(handle, sql = %sql, "statement prepared");
        Ok(PreparedStatement {
            handle,
            sql: sql.to_string(),
        })
    }

    /// Prepare through the LRU cache keyed by SQL text. A statement pushed
    /// out of the cache is closed on the server.
    pub async fn prepare_cached(&mut self, sql: &str) -> DrdaResult<PreparedStatement> {
        if let Some(stmt) = self.stmt_cache.get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = self.prepare(sql).await?;
        if let Some((evicted_sql, evicted)) = self.stmt_cache.push(sql.to_string(), stmt.clone())
            && evicted_sql != sql
        {
            tracing::debug!(handle = evicted.handle, "evicting cached statement");
            self.close_statement(evicted.handle).await?;
        }
        Ok(stmt)
    }

    /// EXCSQLSTT with bound parameters.
    pub async fn execute_prepared_statement(
        &mut self,
        stmt: &PreparedStatement,
        params: &[Value],
    ) -> DrdaResult<QueryResult> {
        self.ensure_connected()?;
        let handle = stmt.handle;
        let frame = self
            .exchange(|corr| DrdaEncoder::execute_prepared(corr, handle, params))
            .await?;
        let result = into_result(&frame);
        self.settle(result)
    }

    /// CLSQRY. Failures are returned, never swallowed.
    pub async fn close_statement(&mut self, handle: u16) -> DrdaResult<()> {
        self.ensure_connected()?;
        let frame = self
            .exchange(|corr| DrdaEncoder::close_statement(corr, handle))
            .await?;
        let result = into_status(&frame);
        self.settle(result)?;
        let cached = self
            .stmt_cache
            .iter()
            .find(|(_, stmt)| stmt.handle == handle)
            .map(|(sql, _)| sql.clone());
        if let Some(sql) = cached {
            self.stmt_cache.pop(&sql);
        }
        Ok(())
    }

    /// Statements currently held by the cache.
    pub fn cached_statements(&self) -> usize {
        self.stmt_cache.len()
    }
}
