//! Stream abstraction for TCP, TLS, and in-process connections.

use super::{DrdaError, DrdaResult};
use crate::config::TlsOptions;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

/// A DRDA connection stream.
pub enum DrdaStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    /// In-process peer, e.g. a test server.
    Duplex(DuplexStream),
}

impl DrdaStream {
    pub async fn connect_tcp(host: &str, port: u16) -> DrdaResult<Self> {
        let tcp = TcpStream::connect((host, port)).await?;
        tcp.set_nodelay(true)?;
        Ok(DrdaStream::Tcp(tcp))
    }

    /// TCP then a rustls handshake, trusting the bundle at `tls.cert_path`
    /// plus the platform roots.
    pub async fn connect_tls(host: &str, port: u16, tls: &TlsOptions) -> DrdaResult<Self> {
        let mut roots = RootCertStore::empty();

        if let Some(path) = &tls.cert_path {
            let pem = tokio::fs::read(path).await.map_err(|e| {
                DrdaError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            let mut added = 0;
            for cert in rustls_pemfile::certs(&mut pem.as_slice()).filter_map(|r| r.ok()) {
                if roots.add(cert).is_ok() {
                    added += 1;
                }
            }
            if added == 0 {
                return Err(DrdaError::Config(format!(
                    "no certificates found in {}",
                    path.display()
                )));
            }
        }
        for cert in rustls_native_certs::load_native_certs().certs {
            let _ = roots.add(cert);
        }

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let name = tls.server_name.clone().unwrap_or_else(|| host.to_string());
        let server_name = ServerName::try_from(name)
            .map_err(|_| DrdaError::Connection("Invalid hostname for TLS".to_string()))?;

        let tcp = TcpStream::connect((host, port)).await?;
        tcp.set_nodelay(true)?;
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| DrdaError::Connection(format!("TLS handshake failed: {}", e)))?;
        Ok(DrdaStream::Tls(Box::new(stream)))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, DrdaStream::Tls(_))
    }
}

impl From<DuplexStream> for DrdaStream {
    fn from(stream: DuplexStream) -> Self {
        DrdaStream::Duplex(stream)
    }
}

impl AsyncRead for DrdaStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DrdaStream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            DrdaStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
            DrdaStream::Duplex(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DrdaStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            DrdaStream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            DrdaStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
            DrdaStream::Duplex(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DrdaStream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            DrdaStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
            DrdaStream::Duplex(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            DrdaStream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            DrdaStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
            DrdaStream::Duplex(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
