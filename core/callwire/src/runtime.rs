// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use std::{io, time};
use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RuntimeConfiguration {
    /// worker threads, 0 means one per available core
    #[serde(default = "default_n_cores")]
    n_cores: usize,

    #[serde(default = "default_thread_name")]
    thread_name: String,

    /// how long in-flight calls may keep running after shutdown starts
    #[serde(
        default = "default_drain_timeout",
        deserialize_with = "deserialize_duration"
    )]
    drain_timeout: time::Duration,
}

impl Default for RuntimeConfiguration {
    fn default() -> Self {
        RuntimeConfiguration {
            n_cores: default_n_cores(),
            thread_name: default_thread_name(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

fn default_n_cores() -> usize {
    0
}

fn default_thread_name() -> String {
    "callwire".to_string()
}

fn default_drain_timeout() -> time::Duration {
    time::Duration::from_secs(10)
}

impl RuntimeConfiguration {
    pub fn new() -> Self {
        RuntimeConfiguration::default()
    }

    pub fn with_cores(self, n_cores: usize) -> Self {
        RuntimeConfiguration { n_cores, ..self }
    }

    pub fn with_thread_name(self, thread_name: &str) -> Self {
        RuntimeConfiguration {
            thread_name: thread_name.to_string(),
            ..self
        }
    }

    pub fn with_drain_timeout(self, drain_timeout: time::Duration) -> Self {
        RuntimeConfiguration {
            drain_timeout,
            ..self
        }
    }

    pub fn n_cores(&self) -> usize {
        self.n_cores
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn drain_timeout(&self) -> time::Duration {
        self.drain_timeout
    }

    /// Worker threads actually used on this machine
    pub fn effective_cores(&self) -> usize {
        let n_cpu = num_cpus::get();
        if self.n_cores > n_cpu {
            warn!(
                "Requested number of cores ({}) is greater than available cores ({}). Using all available cores",
                self.n_cores, n_cpu
            );
            n_cpu
        } else if self.n_cores == 0 {
            info!(%n_cpu, "Using all available cores");
            n_cpu
        } else {
            self.n_cores
        }
    }
}

pub struct CallwireRuntime {
    pub config: RuntimeConfiguration,
    pub runtime: Runtime,
}

pub fn build(config: &RuntimeConfiguration) -> Result<CallwireRuntime, io::Error> {
    let cores = config.effective_cores();

    let runtime = match cores {
        1 => {
            info!("Using single-threaded runtime");
            Builder::new_current_thread()
                .enable_all()
                .thread_name(config.thread_name.as_str())
                .build()?
        }
        _ => {
            info!(%cores, "Using multi-threaded runtime");
            Builder::new_multi_thread()
                .enable_all()
                .thread_name(config.thread_name.as_str())
                .worker_threads(cores)
                .max_blocking_threads(cores)
                .build()?
        }
    };

    Ok(CallwireRuntime {
        config: config.clone(),
        runtime,
    })
}
