// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Context passed to RPC handlers
//!
//! Carries the method being served, caller metadata and the two ways a call
//! can end early: its deadline and its cancellation token.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::{Metadata, calculate_timeout_duration, clamp_timeout, parse_timeout};
use crate::status::Status;

#[derive(Debug, Clone)]
pub struct Context {
    /// `Service/Method` path of the call
    method: String,
    /// Remote address, when the call came over the network
    peer: Option<SocketAddr>,
    /// Request metadata
    metadata: Metadata,
    /// Deadline for the RPC call
    deadline: Option<Instant>,
    /// Cancelled when the caller goes away or the server stops
    cancellation: CancellationToken,
}

impl Context {
    /// Create a context with no deadline
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            peer: None,
            metadata: Metadata::new(),
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Context of an incoming call. The deadline comes from the caller's
    /// budget in `metadata`, or [`MAX_TIMEOUT`](crate::MAX_TIMEOUT) when absent.
    pub(crate) fn for_call(
        method: impl Into<String>,
        peer: SocketAddr,
        metadata: Metadata,
        parent: &CancellationToken,
    ) -> Self {
        let timeout = calculate_timeout_duration(parse_timeout(&metadata));
        Self {
            method: method.into(),
            peer: Some(peer),
            metadata,
            deadline: Some(Instant::now() + timeout),
            cancellation: parent.child_token(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Set the deadline relative to now, at most [`MAX_TIMEOUT`](crate::MAX_TIMEOUT) away
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + clamp_timeout(timeout));
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    /// Cancel the call
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Fail fast when the call is already over. Handlers doing long work
    /// call this between steps.
    pub fn check(&self) -> Result<(), Status> {
        if self.is_cancelled() {
            return Err(Status::cancelled("call cancelled"));
        }
        if self.is_deadline_exceeded() {
            return Err(Status::deadline_exceeded("deadline exceeded"));
        }
        Ok(())
    }

    /// Resolves when the call is cancelled or its deadline passes
    pub async fn done(&self) -> Status {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = self.cancellation.cancelled() => Status::cancelled("call cancelled"),
            _ = deadline => Status::deadline_exceeded("deadline exceeded"),
        }
    }
}
