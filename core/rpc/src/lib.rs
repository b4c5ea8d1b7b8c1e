// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Unary, server-streaming, client-streaming and bidirectional RPC calls.
//!
//! Every call runs over its own connection. The caller opens it with an
//! [`Frame::Open`] naming the `Service/Method` path, both sides exchange
//! [`Frame::Message`]s, the caller half-closes its direction and the callee
//! terminates the call with exactly one [`Frame::Status`].

pub mod call;
pub mod channel;
pub mod codec;
pub mod common;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod server;
pub mod status;
pub mod tls;
pub mod transport;

pub use call::{CallChannel, CallReceiver, CallSender, CallState};
pub use channel::{CallOptions, Channel};
pub use codec::{Decoder, Encoder};
pub use common::{DEADLINE_KEY, MAX_TIMEOUT, Metadata};
pub use config::{ClientConfig, ServerConfig};
pub use context::Context;
pub use error::RpcError;
pub use frame::{Frame, FrameCodec};
pub use server::{HandlerType, RequestStream, ResponseStream, Server};
pub use status::{Code, Status, StatusCell};
pub use tls::{TlsClientConfig, TlsServerConfig};
