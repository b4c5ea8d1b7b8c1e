// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::common::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_FRAME_SIZE};
use crate::error::RpcError;
use crate::tls::{TlsClientConfig, TlsServerConfig};

/// Listener settings of a [`Server`](crate::Server)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_server_endpoint")]
    pub endpoint: String,

    /// Largest frame accepted or produced, in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Buffered inbound messages per call before the reader waits
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Serve over TLS when set
    #[serde(default)]
    pub tls: Option<TlsServerConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_server_endpoint(),
            max_frame_size: default_max_frame_size(),
            channel_capacity: default_channel_capacity(),
            tls: None,
        }
    }
}

/// Connection settings of a [`Channel`](crate::Channel)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientConfig {
    /// `host:port` of the server
    #[serde(default = "default_client_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    #[serde(default)]
    pub tls: Option<TlsClientConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_client_endpoint(),
            max_frame_size: default_max_frame_size(),
            tls: None,
        }
    }
}

fn default_server_endpoint() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_client_endpoint() -> String {
    "127.0.0.1:50051".to_string()
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn validate_limits(max_frame_size: usize, channel_capacity: usize) -> Result<(), RpcError> {
    if max_frame_size == 0 {
        return Err(RpcError::Config("max_frame_size must be positive".to_string()));
    }
    if channel_capacity == 0 {
        return Err(RpcError::Config(
            "channel_capacity must be positive".to_string(),
        ));
    }
    Ok(())
}

impl ServerConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_tls(mut self, tls: TlsServerConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, RpcError> {
        self.endpoint
            .parse()
            .map_err(|e| RpcError::Config(format!("invalid endpoint {}: {}", self.endpoint, e)))
    }

    pub fn validate(&self) -> Result<(), RpcError> {
        self.socket_addr()?;
        validate_limits(self.max_frame_size, self.channel_capacity)
    }
}

impl ClientConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_tls(mut self, tls: TlsClientConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Host part of the endpoint, without brackets for IPv6 literals
    pub fn host(&self) -> Result<&str, RpcError> {
        let (host, port) = self
            .endpoint
            .rsplit_once(':')
            .ok_or_else(|| RpcError::Config(format!("endpoint {} has no port", self.endpoint)))?;

        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(RpcError::Config(format!(
                "endpoint must be in format host:port, got: {}",
                self.endpoint
            )));
        }

        Ok(host.trim_start_matches('[').trim_end_matches(']'))
    }

    pub fn validate(&self) -> Result<(), RpcError> {
        self.host()?;
        if self.max_frame_size == 0 {
            return Err(RpcError::Config("max_frame_size must be positive".to_string()));
        }
        Ok(())
    }
}
