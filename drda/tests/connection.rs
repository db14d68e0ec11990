//! Connection tests against the in-process mock server.

mod common;

use common::{MockServer, PASSWORD, USER, config, config_with_password};
use drda_client::protocol::DecodeError;
use drda_client::protocol::code_points as cp;
use drda_client::{
    AuthConfig, Connection, ConnectionConfig, ConnectionState, DrdaError, IsolationLevel,
    SecurityMechanism, TransactionManager, Value,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

async fn open(server: &MockServer, config: ConnectionConfig) -> (Connection, Result<(), DrdaError>) {
    let mut conn = Connection::from_config(config).unwrap();
    let result = conn.open_with_stream(server.start()).await;
    (conn, result)
}

fn encrypted_config() -> ConnectionConfig {
    ConnectionConfig::new("mock", 50000, "SAMPLE").auth(AuthConfig::Password {
        user: USER.to_string(),
        password: PASSWORD.to_string(),
        encrypt: true,
    })
}

#[tokio::test]
async fn test_plaintext_handshake() {
    let server = MockServer::default();
    let (conn, result) = open(&server, config()).await;
    result.unwrap();

    assert_eq!(conn.state(), ConnectionState::Connected);
    assert!(conn.is_usable());
    assert_eq!(conn.security_mechanism(), Some(SecurityMechanism::UserIdPassword));
    assert!(!conn.is_password_encrypted());
    assert_eq!(conn.server_attributes().server_name.as_deref(), Some("MOCKSRV"));
    assert_eq!(conn.server_attributes().product_id.as_deref(), Some("MOCK0100"));
    assert_eq!(
        server.requests(),
        vec!["EXCSAT", "ACCSEC", "SECCHK PASSWORD", "ACCRDB"]
    );
}

#[tokio::test]
async fn test_encrypted_password_handshake() {
    let server = MockServer::encrypted();
    let (conn, result) = open(&server, encrypted_config()).await;
    result.unwrap();

    assert_eq!(conn.security_mechanism(), Some(SecurityMechanism::EncryptedPassword));
    assert!(conn.is_password_encrypted());
    assert!(server.requests().contains(&"SECCHK SECTKN".to_string()));
}

#[tokio::test]
async fn test_server_upgrades_to_encryption() {
    let server = MockServer::encrypted();
    let (conn, result) = open(&server, config()).await;
    result.unwrap();
    assert!(conn.is_password_encrypted());
}

#[tokio::test]
async fn test_downgrade_to_plaintext_refused() {
    let server = MockServer::default();
    let (conn, result) = open(&server, encrypted_config()).await;
    assert!(matches!(result, Err(DrdaError::AuthFailed(_))));
    assert_eq!(conn.state(), ConnectionState::AuthFailed);
    assert!(!server.requests().iter().any(|r| r.starts_with("SECCHK")));
}

#[tokio::test]
async fn test_wrong_password_lands_in_auth_failed() {
    let server = MockServer::default();
    let (conn, result) = open(&server, config_with_password("wrong")).await;
    match result {
        Err(DrdaError::AuthFailed(code)) => assert_eq!(code, 0x0F),
        other => panic!("expected auth failure, got {other:?}"),
    }
    assert_eq!(conn.state(), ConnectionState::AuthFailed);
    assert!(!conn.is_usable());
}

#[tokio::test]
async fn test_correlation_mismatch_is_protocol_error() {
    let server = MockServer {
        skew_correlation_on: Some(cp::EXCSAT),
        ..MockServer::default()
    };
    let (conn, result) = open(&server, config()).await;
    match result {
        Err(DrdaError::Protocol(DecodeError::CorrelationMismatch { expected, found })) => {
            assert_eq!(found, expected.wrapping_add(1));
        }
        other => panic!("expected correlation mismatch, got {other:?}"),
    }
    assert_eq!(conn.state(), ConnectionState::Error);
}

#[tokio::test]
async fn test_query_rows() {
    let server = MockServer::default();
    let (mut conn, result) = open(&server, config()).await;
    result.unwrap();

    let result = conn
        .query("SELECT id, name FROM users WHERE id > ?", &[Value::from(0i64)])
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0].get_i64(0), Some(1));
    assert_eq!(result.rows[0].get_str(1), Some("ada"));
    assert!(result.rows[1].get(1).is_some_and(Value::is_null));
}

#[tokio::test]
async fn test_sql_error_keeps_connection_usable() {
    let server = MockServer::default();
    let (mut conn, result) = open(&server, config()).await;
    result.unwrap();

    match conn.query("SELECT * FROM BOGUS", &[]).await {
        Err(DrdaError::Query { sqlcode, sqlstate, .. }) => {
            assert_eq!(sqlcode, -204);
            assert_eq!(sqlstate, "42704");
        }
        other => panic!("expected SQL error, got {other:?}"),
    }
    assert!(conn.is_usable());
    assert_eq!(conn.execute_command("UPDATE users SET n = 1").await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_query_timeout_breaks_connection() {
    let server = MockServer::default();
    let (mut conn, result) = open(&server, config()).await;
    result.unwrap();

    let err = conn
        .query_timeout("SELECT SLOW FROM t", &[], Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, DrdaError::Timeout(d) if d == Duration::from_millis(100)));
    assert_eq!(conn.state(), ConnectionState::Error);
    assert!(matches!(
        conn.query("SELECT 1", &[]).await,
        Err(DrdaError::NotConnected(ConnectionState::Error))
    ));
}

#[tokio::test]
async fn test_prepared_statement_lifecycle() {
    let server = MockServer::default();
    let (mut conn, result) = open(&server, config()).await;
    result.unwrap();

    let stmt = conn.prepare("SELECT name FROM users WHERE id = ?").await.unwrap();
    assert_eq!(stmt.handle(), 1);
    let rows = conn
        .execute_prepared_statement(&stmt, &[Value::from(1i64)])
        .await
        .unwrap();
    assert_eq!(rows.rows.len(), 2);
    stmt.close(&mut conn).await.unwrap();

    let requests = server.requests();
    assert_eq!(
        &requests[4..],
        &[
            "PREPARE SELECT name FROM users WHERE id = ?",
            "EXECUTE 1",
            "CLOSE 1"
        ]
    );
}

#[tokio::test]
async fn test_statement_cache_evicts_and_closes() {
    let server = MockServer::default();
    let mut config = config();
    config.statement_cache_size = 1;
    let (mut conn, result) = open(&server, config).await;
    result.unwrap();

    let a = conn.prepare_cached("SELECT a FROM t").await.unwrap();
    let again = conn.prepare_cached("SELECT a FROM t").await.unwrap();
    assert_eq!(a, again);
    conn.prepare_cached("SELECT b FROM t").await.unwrap();
    assert_eq!(conn.cached_statements(), 1);

    let requests = server.requests();
    assert_eq!(
        &requests[4..],
        &["PREPARE SELECT a FROM t", "PREPARE SELECT b FROM t", "CLOSE 1"]
    );
}

#[tokio::test]
async fn test_query_requires_connected() {
    let mut conn = Connection::from_config(config()).unwrap();
    assert!(matches!(
        conn.query("SELECT 1", &[]).await,
        Err(DrdaError::NotConnected(ConnectionState::Disconnected))
    ));
}

#[tokio::test]
async fn test_close() {
    let server = MockServer::default();
    let (mut conn, result) = open(&server, config()).await;
    result.unwrap();
    conn.close().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(!conn.is_usable());
}

#[tokio::test]
async fn test_transaction_over_connection() {
    let server = MockServer::default();
    let (mut conn, result) = open(&server, config().isolation_level(IsolationLevel::RepeatableRead)).await;
    result.unwrap();

    let mut tx = TransactionManager::new(&mut conn);
    tx.begin_transaction(None).await.unwrap();
    tx.begin_transaction(None).await.unwrap();
    tx.target().execute_command("INSERT INTO t VALUES (1)").await.unwrap();
    tx.commit_transaction().await.unwrap();
    assert!(matches!(
        tx.commit_transaction().await,
        Err(DrdaError::NoActiveTransaction)
    ));

    let requests = server.requests();
    assert_eq!(
        &requests[4..],
        &[
            "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            "BEGIN",
            "INSERT INTO t VALUES (1)",
            "COMMIT"
        ]
    );
}
