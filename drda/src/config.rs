//! Connection and pool configuration.
//!
//! All structs deserialize from the `[connection]` and `[pool]` tables of a
//! TOML file; durations are whole milliseconds.

use crate::driver::{DrdaError, DrdaResult};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TlsOptions {
    pub enabled: bool,
    /// PEM bundle of CA certificates to trust.
    pub cert_path: Option<PathBuf>,
    /// SNI name; defaults to the host.
    pub server_name: Option<String>,
}

/// Credentials block, tagged by `type`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Password {
        user: String,
        password: String,
        /// Request RSA-encrypted password transport.
        #[serde(default)]
        encrypt: bool,
    },
    Kerberos {
        principal: String,
        service_name: String,
        keytab: Option<PathBuf>,
    },
    Jwt {
        token: String,
        secret: String,
    },
    Ldap {
        url: String,
        user: String,
        password: String,
        #[serde(default)]
        start_tls: bool,
        ca_cert_path: Option<PathBuf>,
    },
}

impl AuthConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::Password { .. } => "password",
            AuthConfig::Kerberos { .. } => "kerberos",
            AuthConfig::Jwt { .. } => "jwt",
            AuthConfig::Ldap { .. } => "ldap",
        }
    }

    /// Required fields per auth type.
    pub fn validate(&self) -> DrdaResult<()> {
        let missing = |field: &str| {
            Err(DrdaError::Config(format!(
                "{} auth requires '{}'",
                self.kind(),
                field
            )))
        };
        match self {
            AuthConfig::Password { user, password, .. } => {
                if user.is_empty() {
                    return missing("user");
                }
                if password.is_empty() {
                    return missing("password");
                }
            }
            AuthConfig::Kerberos {
                principal,
                service_name,
                ..
            } => {
                if principal.is_empty() {
                    return missing("principal");
                }
                if service_name.is_empty() {
                    return missing("service_name");
                }
            }
            AuthConfig::Jwt { token, secret } => {
                if token.is_empty() {
                    return missing("token");
                }
                if secret.is_empty() {
                    return missing("secret");
                }
            }
            AuthConfig::Ldap {
                url, user, password, ..
            } => {
                if url.is_empty() {
                    return missing("url");
                }
                if user.is_empty() {
                    return missing("user");
                }
                if password.is_empty() {
                    return missing("password");
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    /// External name sent in EXCSAT.
    pub client_name: String,
    pub tls: TlsOptions,
    pub auth: Option<AuthConfig>,
    pub connect_timeout_millis: u64,
    pub query_timeout_millis: Option<u64>,
    pub isolation_level: Option<IsolationLevel>,
    pub statement_cache_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 50000,
            database: String::new(),
            client_name: "drda-rs".to_string(),
            tls: TlsOptions::default(),
            auth: None,
            connect_timeout_millis: 10_000,
            query_timeout_millis: None,
            isolation_level: None,
            statement_cache_size: 100,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: &str, port: u16, database: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
            ..Self::default()
        }
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn password(self, user: &str, password: &str) -> Self {
        self.auth(AuthConfig::Password {
            user: user.to_string(),
            password: password.to_string(),
            encrypt: false,
        })
    }

    pub fn tls(mut self, cert_path: impl Into<PathBuf>) -> Self {
        self.tls = TlsOptions {
            enabled: true,
            cert_path: Some(cert_path.into()),
            server_name: None,
        };
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_millis = timeout.as_millis() as u64;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_millis = Some(timeout.as_millis() as u64);
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_millis)
    }

    pub fn query_timeout_duration(&self) -> Option<Duration> {
        self.query_timeout_millis.map(Duration::from_millis)
    }

    /// Configuration errors, raised before any I/O.
    pub fn validate(&self) -> DrdaResult<()> {
        if self.host.is_empty() {
            return Err(DrdaError::Config("missing host".to_string()));
        }
        if self.port == 0 {
            return Err(DrdaError::Config("missing port".to_string()));
        }
        if self.database.is_empty() {
            return Err(DrdaError::Config("missing database".to_string()));
        }
        if self.tls.enabled && self.tls.cert_path.is_none() {
            return Err(DrdaError::Config(
                "TLS enabled without certificate path".to_string(),
            ));
        }
        match &self.auth {
            None => Err(DrdaError::Config("missing auth".to_string())),
            Some(auth) => auth.validate(),
        }
    }

    /// Driver-style `KEY=value;` string.
    pub fn connection_string(&self) -> DrdaResult<String> {
        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| DrdaError::Config("missing auth".to_string()))?;
        let mut out = format!(
            "DATABASE={};HOSTNAME={};PORT={};PROTOCOL=TCPIP;",
            self.database, self.host, self.port
        );
        if self.tls.enabled {
            out.push_str("SECURITY=SSL;");
            if let Some(path) = &self.tls.cert_path {
                out.push_str(&format!("SSLServerCertificate={};", path.display()));
            }
        }
        out.push_str(&crate::auth::strategy_for(auth).connection_string());
        Ok(out)
    }
}

/// Pool sizing and timing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    pub max_pool_size: usize,
    pub min_pool_size: usize,
    pub acquire_timeout_millis: u64,
    pub idle_timeout_millis: u64,
    pub max_lifetime_millis: Option<u64>,
    pub max_waiting_clients: Option<usize>,
    pub idle_check_interval_millis: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            min_pool_size: 1,
            acquire_timeout_millis: 30_000,
            idle_timeout_millis: 600_000,
            max_lifetime_millis: None,
            max_waiting_clients: None,
            idle_check_interval_millis: 30_000,
        }
    }
}

impl PoolConfig {
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            min_pool_size: min,
            max_pool_size: max,
            ..Self::default()
        }
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_millis = timeout.as_millis() as u64;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_millis = timeout.as_millis() as u64;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime_millis = Some(lifetime.as_millis() as u64);
        self
    }

    pub fn max_waiting_clients(mut self, max: usize) -> Self {
        self.max_waiting_clients = Some(max);
        self
    }

    pub fn idle_check_interval(mut self, interval: Duration) -> Self {
        self.idle_check_interval_millis = interval.as_millis() as u64;
        self
    }

    pub fn acquire_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_millis)
    }

    pub fn idle_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_millis)
    }

    pub fn max_lifetime_duration(&self) -> Option<Duration> {
        self.max_lifetime_millis.map(Duration::from_millis)
    }

    pub fn idle_check_interval_duration(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_millis.max(1))
    }

    pub fn validate(&self) -> DrdaResult<()> {
        if self.max_pool_size == 0 {
            return Err(DrdaError::Config("max_pool_size must be at least 1".to_string()));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(DrdaError::Config(format!(
                "min_pool_size {} exceeds max_pool_size {}",
                self.min_pool_size, self.max_pool_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::new("db.example.com", 50000, "SAMPLE")
            .password("db2inst1", "secret")
            .query_timeout(Duration::from_secs(5));
        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.query_timeout_duration(), Some(Duration::from_secs(5)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = ConnectionConfig::new("", 50000, "SAMPLE")
            .password("u", "p")
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: missing host");

        let err = ConnectionConfig::new("h", 50000, "SAMPLE").validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: missing auth");

        let mut config = ConnectionConfig::new("h", 50000, "SAMPLE").password("u", "p");
        config.tls.enabled = true;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "Configuration error: TLS enabled without certificate path"
        );
    }

    #[test]
    fn test_auth_specific_fields() {
        let jwt = AuthConfig::Jwt {
            token: "t".to_string(),
            secret: String::new(),
        };
        assert_eq!(
            jwt.validate().unwrap_err().to_string(),
            "Configuration error: jwt auth requires 'secret'"
        );
    }

    #[test]
    fn test_ldap_requires_password() {
        let ldap = AuthConfig::Ldap {
            url: "ldaps://dir.example.com".to_string(),
            user: "cn=app".to_string(),
            password: String::new(),
            start_tls: false,
            ca_cert_path: None,
        };
        assert_eq!(
            ldap.validate().unwrap_err().to_string(),
            "Configuration error: ldap auth requires 'password'"
        );
        let config = ConnectionConfig::new("db", 50000, "SAMPLE").auth(ldap);
        assert!(matches!(config.validate(), Err(DrdaError::Config(_))));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let text = r#"
            host = "db"
            port = 50001
            database = "SAMPLE"
            isolation_level = "serializable"

            [auth]
            type = "password"
            user = "db2inst1"
            password = "pw"
            encrypt = true

            [tls]
            enabled = true
            cert_path = "/etc/ca.pem"
        "#;
        let config: ConnectionConfig = toml::from_str(text).unwrap();
        assert_eq!(config.port, 50001);
        assert_eq!(config.isolation_level, Some(IsolationLevel::Serializable));
        assert_eq!(
            config.auth,
            Some(AuthConfig::Password {
                user: "db2inst1".to_string(),
                password: "pw".to_string(),
                encrypt: true,
            })
        );
        assert_eq!(config.client_name, "drda-rs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_string() {
        let config = ConnectionConfig::new("db", 50000, "SAMPLE").password("u", "p");
        assert_eq!(
            config.connection_string().unwrap(),
            "DATABASE=SAMPLE;HOSTNAME=db;PORT=50000;PROTOCOL=TCPIP;UID=u;PWD=p;"
        );
    }

    #[test]
    fn test_pool_config_bounds() {
        assert!(PoolConfig::new(2, 3).validate().is_ok());
        assert!(PoolConfig::new(4, 3).validate().is_err());
        assert!(PoolConfig::new(0, 0).validate().is_err());
    }
}
