// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! The demo services and their typed clients.

pub mod blog;
pub mod calculator;
pub mod greet;

use std::sync::Arc;

use callwire_rpc::{RpcError, Server};

use crate::blog_store::BlogStore;

pub use blog::{BlogClient, BlogService};
pub use calculator::{CalculatorClient, CalculatorService};
pub use greet::{GreetClient, GreetService};

/// Register the greet, calculator and blog services on `server`
pub fn register_all(
    server: &Server,
    greet: GreetService,
    store: Arc<BlogStore>,
) -> Result<(), RpcError> {
    greet.register(server)?;
    CalculatorService::new().register(server)?;
    BlogService::new(store).register(server)?;

    tracing::debug!(methods = ?server.methods(), "services registered");
    Ok(())
}
