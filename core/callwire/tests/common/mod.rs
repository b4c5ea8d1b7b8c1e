// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::time::Duration;

use callwire::config::ConfigLoader;
use callwire::runner::Application;
use callwire::services::GreetService;
use callwire_rpc::Channel;

/// The full application on a loopback port with an in-memory store
pub struct TestEnv {
    app: Option<Application>,
    pub channel: Channel,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self::with_greet(GreetService::with_step(Duration::from_millis(10))).await
    }

    pub async fn with_greet(greet: GreetService) -> Self {
        let path = format!("{}/testdata/config-local.yaml", env!("CARGO_MANIFEST_DIR"));
        let mut config = ConfigLoader::new(&path).expect("failed to load test config");

        let app = Application::start(&mut config, greet)
            .await
            .expect("failed to start application");
        let addr = app.local_addr().expect("server address");
        let channel = Channel::new(addr.to_string()).expect("failed to create channel");

        Self {
            app: Some(app),
            channel,
        }
    }

    pub async fn stop(&mut self) {
        if let Some(app) = self.app.take() {
            app.stop(Duration::from_secs(2))
                .await
                .expect("failed to stop application");
        }
    }
}
