// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Resolves once the process is asked to stop.

pub async fn shutdown() {
    imp::shutdown().await
}

#[cfg(unix)]
mod imp {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::{error, info};

    pub(super) async fn shutdown() {
        tokio::select! {
            // interrupt from the terminal
            _ = sig(SignalKind::interrupt(), "SIGINT") => {}
            // e.g. sent by a process supervisor
            _ = sig(SignalKind::terminate(), "SIGTERM") => {}
        };
    }

    async fn sig(kind: SignalKind, name: &str) {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(
                    target: "callwire::signal",
                    "received signal {}, starting shutdown",
                    name,
                );
            }
            Err(e) => {
                // never resolve, the other branch of the select may still fire
                error!(
                    target: "callwire::signal",
                    error = %e,
                    "failed to register {} handler",
                    name
                );
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use tracing::info;

    pub(super) async fn shutdown() {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(
                target: "callwire::signal",
                "received signal Ctrl-C, starting shutdown",
            );
        }
    }
}
