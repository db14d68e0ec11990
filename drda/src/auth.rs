//! Authentication strategies.
//!
//! A strategy turns configuration into the credential material the
//! security check needs. Construction never touches the network or disk;
//! `authenticate()` may (reading a keytab, verifying a token).

use crate::config::AuthConfig;
use crate::driver::{DrdaError, DrdaResult};
use crate::protocol::SecurityMechanism;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Credential material ready for SECCHK.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    /// Mechanism the client asks for in EXCSAT/ACCSEC.
    pub mechanism: SecurityMechanism,
    pub secret: Secret,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    Password(String),
    Token(Vec<u8>),
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secret::Password(_) => f.write_str("Password(<redacted>)"),
            Secret::Token(_) => f.write_str("Token(<redacted>)"),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = match self.secret {
            Secret::Password(_) => "password",
            Secret::Token(_) => "token",
        };
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("mechanism", &self.mechanism)
            .field("secret", &secret)
            .finish()
    }
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Produce credentials, failing clearly when required fields are absent.
    async fn authenticate(&self) -> DrdaResult<Credentials>;

    /// Driver-level `KEY=value;` parameters for this strategy.
    fn connection_string(&self) -> String;

    fn kind(&self) -> &'static str;
}

/// Build the strategy named by `config`.
pub fn strategy_for(config: &AuthConfig) -> Arc<dyn AuthStrategy> {
    match config.clone() {
        AuthConfig::Password {
            user,
            password,
            encrypt,
        } => Arc::new(PasswordAuth {
            user,
            password,
            encrypt,
        }),
        AuthConfig::Kerberos {
            principal,
            service_name,
            keytab,
        } => Arc::new(KerberosAuth {
            principal,
            service_name,
            keytab,
        }),
        AuthConfig::Jwt { token, secret } => Arc::new(JwtAuth { token, secret }),
        AuthConfig::Ldap {
            url,
            user,
            password,
            start_tls,
            ca_cert_path,
        } => Arc::new(LdapAuth {
            url,
            user,
            password,
            start_tls,
            ca_cert_path,
        }),
    }
}

fn missing(kind: &str, field: &str) -> DrdaError {
    DrdaError::Auth(format!("{} auth requires '{}'", kind, field))
}

/// User id and password, plaintext or RSA-encrypted on the wire.
#[derive(Clone)]
pub struct PasswordAuth {
    pub user: String,
    pub password: String,
    pub encrypt: bool,
}

impl PasswordAuth {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            encrypt: false,
        }
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(&self) -> DrdaResult<Credentials> {
        if self.user.is_empty() {
            return Err(missing("password", "user"));
        }
        if self.password.is_empty() {
            return Err(missing("password", "password"));
        }
        let mechanism = if self.encrypt {
            SecurityMechanism::EncryptedPassword
        } else {
            SecurityMechanism::UserIdPassword
        };
        Ok(Credentials {
            user: self.user.clone(),
            mechanism,
            secret: Secret::Password(self.password.clone()),
        })
    }

    fn connection_string(&self) -> String {
        let mut out = format!("UID={};PWD={};", self.user, self.password);
        if self.encrypt {
            out.push_str("SECURITYMECHANISM=7;");
        }
        out
    }

    fn kind(&self) -> &'static str {
        "password"
    }
}

/// Kerberos ticket from a keytab, or from the credential cache named by
/// `KRB5CCNAME`.
#[derive(Clone)]
pub struct KerberosAuth {
    pub principal: String,
    pub service_name: String,
    pub keytab: Option<PathBuf>,
}

impl KerberosAuth {
    fn ticket_source(&self) -> Option<PathBuf> {
        self.keytab.clone().or_else(|| {
            std::env::var("KRB5CCNAME")
                .ok()
                .map(|v| PathBuf::from(v.trim_start_matches("FILE:")))
        })
    }
}

#[async_trait]
impl AuthStrategy for KerberosAuth {
    async fn authenticate(&self) -> DrdaResult<Credentials> {
        if self.principal.is_empty() {
            return Err(missing("kerberos", "principal"));
        }
        if self.service_name.is_empty() {
            return Err(missing("kerberos", "service_name"));
        }
        let source = self.ticket_source().ok_or_else(|| {
            DrdaError::Auth("kerberos auth needs a keytab or KRB5CCNAME".to_string())
        })?;
        let ticket = tokio::fs::read(&source).await.map_err(|e| {
            DrdaError::Auth(format!("cannot read {}: {}", source.display(), e))
        })?;
        if ticket.is_empty() {
            return Err(DrdaError::Auth(format!("{} is empty", source.display())));
        }
        tracing::debug!(principal = %self.principal, service = %self.service_name, "kerberos ticket loaded");
        Ok(Credentials {
            user: self.principal.clone(),
            mechanism: SecurityMechanism::Kerberos,
            secret: Secret::Token(ticket),
        })
    }

    fn connection_string(&self) -> String {
        format!(
            "AUTHENTICATION=KERBEROS;KRBPLUGIN=IBMkrb5;SERVICENAME={};",
            self.service_name
        )
    }

    fn kind(&self) -> &'static str {
        "kerberos"
    }
}

/// Claims required of a JWT used for database login.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Subject, used as the database user.
    pub sub: String,
    pub exp: usize,
}

/// Bearer token checked locally (HS256) before it is presented.
#[derive(Clone)]
pub struct JwtAuth {
    pub token: String,
    pub secret: String,
}

impl JwtAuth {
    pub fn validate(&self) -> DrdaResult<JwtClaims> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        decode::<JwtClaims>(&self.token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| DrdaError::Auth(format!("invalid JWT: {}", e)))
    }
}

#[async_trait]
impl AuthStrategy for JwtAuth {
    async fn authenticate(&self) -> DrdaResult<Credentials> {
        if self.token.is_empty() {
            return Err(missing("jwt", "token"));
        }
        if self.secret.is_empty() {
            return Err(missing("jwt", "secret"));
        }
        let claims = self.validate()?;
        Ok(Credentials {
            user: claims.sub,
            mechanism: SecurityMechanism::Plugin,
            secret: Secret::Token(self.token.as_bytes().to_vec()),
        })
    }

    fn connection_string(&self) -> String {
        format!(
            "AUTHENTICATION=TOKEN;ACCESSTOKEN={};ACCESSTOKENTYPE=JWT;",
            self.token
        )
    }

    fn kind(&self) -> &'static str {
        "jwt"
    }
}

/// Directory bind; the server verifies against LDAP, the client sends a
/// user id and password.
#[derive(Clone)]
pub struct LdapAuth {
    pub url: String,
    pub user: String,
    pub password: String,
    pub start_tls: bool,
    pub ca_cert_path: Option<PathBuf>,
}

impl LdapAuth {
    fn parsed_url(&self) -> DrdaResult<url::Url> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| DrdaError::Auth(format!("invalid LDAP URL '{}': {}", self.url, e)))?;
        match parsed.scheme() {
            "ldap" | "ldaps" => {}
            other => {
                return Err(DrdaError::Auth(format!(
                    "LDAP URL scheme must be ldap or ldaps, got '{}'",
                    other
                )));
            }
        }
        if parsed.host_str().is_none() {
            return Err(DrdaError::Auth(format!("LDAP URL '{}' has no host", self.url)));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl AuthStrategy for LdapAuth {
    async fn authenticate(&self) -> DrdaResult<Credentials> {
        if self.user.is_empty() {
            return Err(missing("ldap", "user"));
        }
        if self.password.is_empty() {
            return Err(missing("ldap", "password"));
        }
        let url = self.parsed_url()?;
        if (url.scheme() == "ldaps" || self.start_tls)
            && let Some(ca) = &self.ca_cert_path
        {
            tokio::fs::metadata(ca).await.map_err(|e| {
                DrdaError::Auth(format!("LDAP CA bundle {}: {}", ca.display(), e))
            })?;
        }
        Ok(Credentials {
            user: self.user.clone(),
            mechanism: SecurityMechanism::UserIdPassword,
            secret: Secret::Password(self.password.clone()),
        })
    }

    fn connection_string(&self) -> String {
        let mut out = format!(
            "AUTHENTICATION=LDAP;LDAPURL={};UID={};PWD={};",
            self.url, self.user, self.password
        );
        if self.start_tls {
            out.push_str("LDAPSTARTTLS=1;");
        }
        out
    }

    fn kind(&self) -> &'static str {
        "ldap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: usize,
    }

    fn token(secret: &str) -> String {
        let claims = Claims {
            sub: "etl_user",
            exp: 4_102_444_800,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_password_mechanism_follows_encrypt_flag() {
        let plain = PasswordAuth::new("u", "p").authenticate().await.unwrap();
        assert_eq!(plain.mechanism, SecurityMechanism::UserIdPassword);
        let enc = PasswordAuth::new("u", "p")
            .encrypted()
            .authenticate()
            .await
            .unwrap();
        assert_eq!(enc.mechanism, SecurityMechanism::EncryptedPassword);
        assert_eq!(enc.secret, Secret::Password("p".to_string()));
    }

    #[tokio::test]
    async fn test_password_missing_field() {
        let err = PasswordAuth::new("u", "").authenticate().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Auth error: password auth requires 'password'"
        );
    }

    #[tokio::test]
    async fn test_jwt_subject_becomes_user() {
        let auth = JwtAuth {
            token: token("s3cret"),
            secret: "s3cret".to_string(),
        };
        let creds = auth.authenticate().await.unwrap();
        assert_eq!(creds.user, "etl_user");
        assert_eq!(creds.mechanism, SecurityMechanism::Plugin);
    }

    #[tokio::test]
    async fn test_jwt_wrong_secret_rejected() {
        let auth = JwtAuth {
            token: token("s3cret"),
            secret: "other".to_string(),
        };
        assert!(matches!(auth.authenticate().await, Err(DrdaError::Auth(_))));
    }

    #[tokio::test]
    async fn test_kerberos_reads_keytab() {
        let path = std::env::temp_dir().join(format!("drda-keytab-{}", std::process::id()));
        std::fs::write(&path, [0x05, 0x02, 0xAA]).unwrap();
        let auth = KerberosAuth {
            principal: "svc@EXAMPLE.COM".to_string(),
            service_name: "db2".to_string(),
            keytab: Some(path.clone()),
        };
        let creds = auth.authenticate().await.unwrap();
        assert_eq!(creds.secret, Secret::Token(vec![0x05, 0x02, 0xAA]));
        assert_eq!(creds.mechanism, SecurityMechanism::Kerberos);
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_ldap_url_scheme_checked() {
        let mut auth = LdapAuth {
            url: "http://dir.example.com".to_string(),
            user: "cn=app".to_string(),
            password: "pw".to_string(),
            start_tls: false,
            ca_cert_path: None,
        };
        assert!(auth.authenticate().await.is_err());
        auth.url = "ldaps://dir.example.com:636".to_string();
        let creds = auth.authenticate().await.unwrap();
        assert_eq!(creds.user, "cn=app");
    }

    #[test]
    fn test_strategy_for_config() {
        let config = AuthConfig::Kerberos {
            principal: "p".to_string(),
            service_name: "db2".to_string(),
            keytab: None,
        };
        let strategy = strategy_for(&config);
        assert_eq!(strategy.kind(), "kerberos");
        assert!(strategy.connection_string().contains("SERVICENAME=db2;"));
    }
}
