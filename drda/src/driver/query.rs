//! Query execution: query, query_timeout, execute_command.

use super::connection::Connection;
use super::state::ConnectionState;
use super::{DrdaError, DrdaResult};
use crate::protocol::{DecodeError, DrdaEncoder, Frame, Reply, Row, SqlCard, Value};
use bytes::BytesMut;
use std::time::Duration;

/// Rows plus the affected-row count reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl Connection {
    /// Execute SQL text with bound parameters, using the configured
    /// query timeout if there is one.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> DrdaResult<QueryResult> {
        match self.config.query_timeout_duration() {
            Some(timeout) => self.query_timeout(sql, params, timeout).await,
            None => {
                self.ensure_connected()?;
                let frame = self
                    .exchange(|corr| DrdaEncoder::execute_immediate(corr, sql, params))
                    .await?;
                let result = into_result(&frame);
                self.settle(result)
            }
        }
    }

    /// Like `query`, with an explicit timeout. A timed-out request leaves
    /// the reply unread, so the connection moves to ERROR.
    pub async fn query_timeout(
        &mut self,
        sql: &str,
        params: &[Value],
        timeout: Duration,
    ) -> DrdaResult<QueryResult> {
        self.ensure_connected()?;
        let exchange = self.exchange(|corr| DrdaEncoder::execute_immediate(corr, sql, params));
        let outcome = tokio::time::timeout(timeout, exchange).await;
        match outcome {
            Ok(frame) => {
                let result = into_result(&frame?);
                self.settle(result)
            }
            Err(_) => {
                tracing::warn!(sql = %sql, ?timeout, "query timed out");
                Err(self.fail(DrdaError::Timeout(timeout)))
            }
        }
    }

    /// Execute a statement that returns no rows; yields the affected count.
    pub async fn execute_command(&mut self, sql: &str) -> DrdaResult<u64> {
        Ok(self.query(sql, &[]).await?.rows_affected)
    }

    pub(crate) fn ensure_connected(&self) -> DrdaResult<()> {
        match self.state.state() {
            ConnectionState::Connected => Ok(()),
            state => Err(DrdaError::NotConnected(state)),
        }
    }

    /// `request`, moving the connection to ERROR on I/O or protocol failure.
    pub(crate) async fn exchange<F>(&mut self, build: F) -> DrdaResult<Frame>
    where
        F: FnOnce(u16) -> Result<BytesMut, crate::protocol::EncodeError>,
    {
        match self.request(build).await {
            Ok(frame) => Ok(frame),
            Err(e @ DrdaError::Encode(_)) => Err(e),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Protocol errors in a reply put the connection in ERROR; SQL errors
    /// leave it usable.
    pub(crate) fn settle<T>(&mut self, result: DrdaResult<T>) -> DrdaResult<T> {
        match result {
            Err(e @ DrdaError::Protocol(_)) => Err(self.fail(e)),
            other => other,
        }
    }
}

pub(crate) fn sql_error(card: SqlCard) -> DrdaError {
    DrdaError::Query {
        sqlcode: card.sqlcode,
        sqlstate: card.sqlstate,
        message: card.message,
    }
}

/// Map an execute reply to rows or a status.
pub(crate) fn into_result(frame: &Frame) -> DrdaResult<QueryResult> {
    match Reply::decode(frame)? {
        Reply::Rows(rows) => Ok(QueryResult {
            rows_affected: rows.len() as u64,
            rows,
        }),
        Reply::Status(card) if card.is_error() => Err(sql_error(card)),
        Reply::Status(card) => Ok(QueryResult {
            rows: Vec::new(),
            rows_affected: card.rows_affected.max(0) as u64,
        }),
        _ => Err(unexpected("QRYDTA or SQLCARD", frame)),
    }
}

/// Map a reply that must be a status card.
pub(crate) fn into_status(frame: &Frame) -> DrdaResult<SqlCard> {
    match Reply::decode(frame)? {
        Reply::Status(card) if card.is_error() => Err(sql_error(card)),
        Reply::Status(card) => Ok(card),
        _ => Err(unexpected("SQLCARD", frame)),
    }
}

pub(crate) fn unexpected(expected: &'static str, frame: &Frame) -> DrdaError {
    DrdaError::Protocol(DecodeError::UnexpectedCodePoint {
        expected,
        found: frame.code_point,
    })
}
