// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Per-call bidirectional channel
//!
//! A [`CallChannel`] owns the connection of a single call. It is split into a
//! [`CallSender`] and a [`CallReceiver`] so that both directions can be driven
//! from independent tasks. The halves share a [`CallState`] which tracks
//! which directions are still open.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::RpcError;
use crate::frame::{Frame, FrameCodec};
use crate::status::{Status, StatusCell};
use crate::transport::BoxedIo;

/// Direction bookkeeping of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Both directions are open
    Open,
    /// We will not send anything else, the peer may still send
    HalfClosedLocal,
    /// The peer will not send anything else, we may still send
    HalfClosedRemote,
    /// Both directions are done
    Closed,
}

impl CallState {
    fn close_local(self) -> Self {
        match self {
            CallState::Open => CallState::HalfClosedLocal,
            CallState::HalfClosedRemote | CallState::Closed => CallState::Closed,
            CallState::HalfClosedLocal => CallState::HalfClosedLocal,
        }
    }

    fn close_remote(self) -> Self {
        match self {
            CallState::Open => CallState::HalfClosedRemote,
            CallState::HalfClosedLocal | CallState::Closed => CallState::Closed,
            CallState::HalfClosedRemote => CallState::HalfClosedRemote,
        }
    }

    pub fn can_send(&self) -> bool {
        matches!(self, CallState::Open | CallState::HalfClosedRemote)
    }

    pub fn can_receive(&self) -> bool {
        matches!(self, CallState::Open | CallState::HalfClosedLocal)
    }
}

type SharedState = Arc<Mutex<CallState>>;

pub struct CallChannel {
    sender: CallSender,
    receiver: CallReceiver,
}

impl CallChannel {
    pub fn new(io: BoxedIo, max_frame_size: usize) -> Self {
        let (read, write) = tokio::io::split(io);
        let state = Arc::new(Mutex::new(CallState::Open));

        Self {
            sender: CallSender {
                framed: FramedWrite::new(write, FrameCodec::new(max_frame_size)),
                state: state.clone(),
                status: StatusCell::new(),
            },
            receiver: CallReceiver {
                framed: FramedRead::new(read, FrameCodec::new(max_frame_size)),
                state,
            },
        }
    }

    pub fn state(&self) -> CallState {
        *self.sender.state.lock()
    }

    pub fn split(self) -> (CallSender, CallReceiver) {
        (self.sender, self.receiver)
    }
}

/// Sending half of a call
pub struct CallSender {
    framed: FramedWrite<WriteHalf<BoxedIo>, FrameCodec>,
    state: SharedState,
    status: StatusCell,
}

impl CallSender {
    pub fn state(&self) -> CallState {
        *self.state.lock()
    }

    /// Open the call on the remote side
    pub async fn open(
        &mut self,
        method: impl Into<String>,
        metadata: crate::Metadata,
    ) -> Result<(), RpcError> {
        self.ensure_can_send()?;
        self.framed
            .send(Frame::Open {
                method: method.into(),
                metadata,
            })
            .await
    }

    pub async fn send_message(&mut self, payload: Vec<u8>) -> Result<(), RpcError> {
        self.ensure_can_send()?;
        self.framed.send(Frame::Message(payload)).await
    }

    /// Close our send direction. Closing twice is a no-op.
    pub async fn half_close(&mut self) -> Result<(), RpcError> {
        if !self.state().can_send() {
            return Ok(());
        }
        self.framed.send(Frame::HalfClose).await?;
        self.transition(CallState::close_local);
        Ok(())
    }

    /// Terminate the call with its status. Only the first status of a call
    /// is ever sent.
    pub async fn send_status(&mut self, status: &Status) -> Result<(), RpcError> {
        self.ensure_can_send()?;
        self.status
            .set(status.clone())
            .map_err(|_| RpcError::StatusAlreadySent)?;
        self.framed.send(Frame::status(status)).await?;
        self.transition(CallState::close_local);
        Ok(())
    }

    /// Status sent on this call, if any
    pub fn sent_status(&self) -> Option<&Status> {
        self.status.get()
    }

    /// Abandon the call. Errors are ignored: the peer may already be gone.
    pub async fn cancel(&mut self) {
        if self.state() == CallState::Closed {
            return;
        }
        if let Err(e) = self.framed.send(Frame::Cancel).await {
            tracing::debug!(error = %e, "failed to send cancel frame");
        }
        self.transition(|_| CallState::Closed);
    }

    /// Flush pending frames and shut down the write side of the connection
    pub async fn close(&mut self) -> Result<(), RpcError> {
        self.transition(CallState::close_local);
        self.framed.close().await
    }

    fn ensure_can_send(&self) -> Result<(), RpcError> {
        if self.state().can_send() {
            Ok(())
        } else {
            Err(RpcError::SendClosed)
        }
    }

    fn transition(&self, f: impl FnOnce(CallState) -> CallState) {
        let mut state = self.state.lock();
        *state = f(*state);
    }
}

/// Receiving half of a call
pub struct CallReceiver {
    framed: FramedRead<ReadHalf<BoxedIo>, FrameCodec>,
    state: SharedState,
}

impl CallReceiver {
    pub fn state(&self) -> CallState {
        *self.state.lock()
    }

    /// Next frame from the peer, `None` once the connection is closed.
    ///
    /// `Cancel` frames are still delivered after the peer half-closed; a
    /// `Message` after that point is a protocol violation.
    pub async fn recv(&mut self) -> Result<Option<Frame>, RpcError> {
        let Some(frame) = self.framed.next().await.transpose()? else {
            self.transition(|_| CallState::Closed);
            return Ok(None);
        };

        match &frame {
            Frame::Message(_) if !self.state().can_receive() => {
                return Err(RpcError::Protocol(
                    "message received after half-close".to_string(),
                ));
            }
            Frame::HalfClose | Frame::Status { .. } => self.transition(CallState::close_remote),
            Frame::Cancel => self.transition(|_| CallState::Closed),
            Frame::Open { .. } | Frame::Message(_) => {}
        }

        Ok(Some(frame))
    }

    fn transition(&self, f: impl FnOnce(CallState) -> CallState) {
        let mut state = self.state.lock();
        *state = f(*state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DEFAULT_MAX_FRAME_SIZE;
    use crate::{Code, Metadata};

    fn pair() -> (CallChannel, CallChannel) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            CallChannel::new(Box::new(a), DEFAULT_MAX_FRAME_SIZE),
            CallChannel::new(Box::new(b), DEFAULT_MAX_FRAME_SIZE),
        )
    }

    #[test]
    fn test_state_transitions() {
        let state = CallState::Open;
        assert!(state.can_send() && state.can_receive());

        let local = state.close_local();
        assert_eq!(local, CallState::HalfClosedLocal);
        assert!(!local.can_send() && local.can_receive());
        assert_eq!(local.close_remote(), CallState::Closed);

        let remote = state.close_remote();
        assert_eq!(remote, CallState::HalfClosedRemote);
        assert!(remote.can_send() && !remote.can_receive());
        assert_eq!(remote.close_local(), CallState::Closed);
    }

    #[tokio::test]
    async fn test_call_exchange() {
        let (client, server) = pair();
        let (mut client_tx, mut client_rx) = client.split();
        let (mut server_tx, mut server_rx) = server.split();

        client_tx
            .open("CalculatorService/Sum", Metadata::new())
            .await
            .unwrap();
        client_tx.send_message(vec![1, 2]).await.unwrap();
        client_tx.half_close().await.unwrap();
        assert_eq!(client_tx.state(), CallState::HalfClosedLocal);
        assert!(matches!(
            client_tx.send_message(vec![3]).await,
            Err(RpcError::SendClosed)
        ));

        assert!(matches!(
            server_rx.recv().await.unwrap(),
            Some(Frame::Open { .. })
        ));
        assert_eq!(
            server_rx.recv().await.unwrap(),
            Some(Frame::Message(vec![1, 2]))
        );
        assert_eq!(server_rx.recv().await.unwrap(), Some(Frame::HalfClose));
        assert_eq!(server_rx.state(), CallState::HalfClosedRemote);

        server_tx.send_message(vec![3]).await.unwrap();
        server_tx.send_status(&Status::ok()).await.unwrap();
        assert_eq!(server_tx.state(), CallState::Closed);

        assert_eq!(
            client_rx.recv().await.unwrap(),
            Some(Frame::Message(vec![3]))
        );
        let status = client_rx.recv().await.unwrap().and_then(Frame::into_status);
        assert_eq!(status.map(|s| s.code()), Some(Code::Ok));
        assert_eq!(client_rx.state(), CallState::Closed);
    }

    #[tokio::test]
    async fn test_status_is_sent_once() {
        let (_client, server) = pair();
        let (mut server_tx, _server_rx) = server.split();

        server_tx
            .send_status(&Status::not_found("missing"))
            .await
            .unwrap();
        assert!(server_tx.send_status(&Status::ok()).await.is_err());
        assert_eq!(
            server_tx.sent_status().map(Status::code),
            Some(Code::NotFound)
        );
    }

    #[tokio::test]
    async fn test_cancel_after_half_close() {
        let (client, server) = pair();
        let (mut client_tx, _client_rx) = client.split();
        let (_server_tx, mut server_rx) = server.split();

        client_tx.half_close().await.unwrap();
        client_tx.cancel().await;
        assert_eq!(client_tx.state(), CallState::Closed);

        assert_eq!(server_rx.recv().await.unwrap(), Some(Frame::HalfClose));
        assert_eq!(server_rx.recv().await.unwrap(), Some(Frame::Cancel));
    }

    #[tokio::test]
    async fn test_recv_reports_closed_connection() {
        let (client, server) = pair();
        drop(client);

        let (_server_tx, mut server_rx) = server.split();
        assert_eq!(server_rx.recv().await.unwrap(), None);
        assert_eq!(server_rx.state(), CallState::Closed);
    }
}
