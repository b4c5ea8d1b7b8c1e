// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! TCP listener and connector, optionally wrapped in TLS

use std::net::SocketAddr;

use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::config::{ClientConfig, ServerConfig};
use crate::error::RpcError;

/// Byte stream carrying one call
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedIo = Box<dyn Io>;

pub struct Listener {
    inner: TcpListener,
    acceptor: Option<TlsAcceptor>,
}

impl Listener {
    pub async fn bind(config: &ServerConfig) -> Result<Self, RpcError> {
        config.validate()?;

        let acceptor = config
            .tls
            .as_ref()
            .map(|tls| tls.load_acceptor())
            .transpose()?;
        let inner = TcpListener::bind(config.socket_addr()?).await?;

        Ok(Self { inner, acceptor })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.inner.local_addr()?)
    }

    pub fn is_tls(&self) -> bool {
        self.acceptor.is_some()
    }

    /// Accept the next connection. The TLS handshake is deferred to
    /// [`Incoming::establish`] so a slow peer never stalls the accept loop.
    pub async fn accept(&self) -> Result<(Incoming, SocketAddr), RpcError> {
        let (stream, peer) = self.inner.accept().await?;
        stream.set_nodelay(true)?;

        Ok((
            Incoming {
                stream,
                acceptor: self.acceptor.clone(),
            },
            peer,
        ))
    }
}

pub struct Incoming {
    stream: TcpStream,
    acceptor: Option<TlsAcceptor>,
}

impl Incoming {
    pub async fn establish(self) -> Result<BoxedIo, RpcError> {
        match self.acceptor {
            Some(acceptor) => {
                let stream = acceptor
                    .accept(self.stream)
                    .await
                    .map_err(|e| RpcError::Tls(format!("handshake failed: {}", e)))?;
                Ok(Box::new(stream))
            }
            None => Ok(Box::new(self.stream)),
        }
    }
}

#[derive(Clone)]
pub struct Connector {
    endpoint: String,
    tls: Option<(TlsConnector, ServerName<'static>)>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("endpoint", &self.endpoint)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

impl Connector {
    pub fn new(config: &ClientConfig) -> Result<Self, RpcError> {
        config.validate()?;

        let tls = match &config.tls {
            Some(tls) => Some((tls.load_connector()?, tls.server_name(config.host()?)?)),
            None => None,
        };

        Ok(Self {
            endpoint: config.endpoint.clone(),
            tls,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn connect(&self) -> Result<BoxedIo, RpcError> {
        let stream = TcpStream::connect(&self.endpoint).await?;
        stream.set_nodelay(true)?;

        match &self.tls {
            Some((connector, server_name)) => {
                let stream = connector
                    .connect(server_name.clone(), stream)
                    .await
                    .map_err(|e| RpcError::Tls(format!("handshake failed: {}", e)))?;
                Ok(Box::new(stream))
            }
            None => Ok(Box::new(stream)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_plain_connection() {
        let listener = Listener::bind(&ServerConfig::with_endpoint("127.0.0.1:0"))
            .await
            .unwrap();
        assert!(!listener.is_tls());
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (incoming, _peer) = listener.accept().await.unwrap();
            let mut io = incoming.establish().await.unwrap();
            let mut buf = [0u8; 5];
            io.read_exact(&mut buf).await.unwrap();
            io.write_all(&buf).await.unwrap();
        });

        let connector = Connector::new(&ClientConfig::with_endpoint(addr.to_string())).unwrap();
        let mut io = connector.connect().await.unwrap();
        io.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        io.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = Listener::bind(&ServerConfig::with_endpoint("127.0.0.1:0"))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = Connector::new(&ClientConfig::with_endpoint(addr.to_string())).unwrap();
        assert!(matches!(connector.connect().await, Err(RpcError::Io(_))));
    }

    #[test]
    fn test_connector_rejects_bad_endpoint() {
        assert!(Connector::new(&ClientConfig::with_endpoint("nowhere")).is_err());
    }
}
