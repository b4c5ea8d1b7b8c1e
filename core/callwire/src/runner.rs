// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, span, warn};

use callwire_rpc::Server;
use callwire_rpc::tls;

use crate::blog_store::BlogStore;
use crate::config::ConfigLoader;
use crate::runtime;
use crate::services::{self, GreetService};

/// A started server together with the store its services use
#[derive(Debug)]
pub struct Application {
    server: Server,
    handle: JoinHandle<()>,
    store: Arc<BlogStore>,
}

impl Application {
    /// Open the store, register the services and start accepting calls
    pub async fn start(config: &mut ConfigLoader, greet: GreetService) -> Result<Self> {
        let server_config = config
            .server()
            .context("invalid server configuration")?
            .clone();
        let collection = config
            .store()
            .context("invalid store configuration")?
            .build();
        let store = Arc::new(BlogStore::new(collection));

        let server = Server::new(server_config);
        services::register_all(&server, greet, store.clone())
            .context("failed to register services")?;

        let handle = server.serve().await.context("failed to start server")?;

        Ok(Self {
            server,
            handle,
            store,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    /// Stop accepting calls, give in-flight calls `drain_timeout` to finish,
    /// then close the store.
    pub async fn stop(self, drain_timeout: Duration) -> Result<()> {
        info!(timeout = ?drain_timeout, "draining server");
        self.server.shutdown(drain_timeout).await;
        if let Err(e) = self.handle.await {
            warn!(error = %e, "accept loop ended abnormally");
        }

        debug!("closing store");
        self.store.close().await.context("failed to close store")?;
        info!("shutdown complete");
        Ok(())
    }
}

/// Async body: tracing setup, server lifecycle, graceful shutdown.
pub async fn run_server(mut config: ConfigLoader) -> Result<()> {
    let tracing_conf = config.tracing().context("invalid tracing configuration")?;
    tracing_conf.setup_tracing_subscriber();

    let root_span = span!(tracing::Level::INFO, "application_lifecycle");
    let _enter = root_span.enter();

    debug!(?tracing_conf);

    let drain_timeout = config
        .runtime()
        .context("invalid runtime configuration")?
        .drain_timeout();

    let app = Application::start(&mut config, GreetService::new()).await?;
    info!(addr = ?app.local_addr(), "callwire server started");

    callwire_signal::shutdown().await;
    debug!("Received shutdown signal");

    app.stop(drain_timeout).await
}

/// Load config from `config_file`, build the runtime described by its
/// `runtime:` section and serve until a shutdown signal is received.
///
/// This is a blocking call.
pub fn run(config_file: &str) -> Result<()> {
    let mut config = ConfigLoader::new(config_file).context("failed to load configuration")?;

    tls::initialize_crypto_provider();

    let runtime_config = config.runtime().context("invalid runtime configuration")?;
    let callwire_runtime = runtime::build(runtime_config).context("failed to build runtime")?;
    callwire_runtime.runtime.block_on(run_server(config))
}
