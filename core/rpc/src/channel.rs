// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Client-side RPC channel implementation
//!
//! A [`Channel`] opens one connection per call and drives the caller side of
//! the four interaction patterns. Every call is raced against the caller's
//! deadline and cancellation token; when either fires first the call is
//! cancelled on the server and the caller gets `DeadlineExceeded` or
//! `Cancelled`.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures::stream::Stream;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::call::{CallChannel, CallReceiver, CallSender};
use crate::codec::{Decoder, Encoder};
use crate::common::{DEADLINE_KEY, Metadata, clamp_timeout, method_path};
use crate::config::ClientConfig;
use crate::error::RpcError;
use crate::frame::Frame;
use crate::status::Status;
use crate::transport::Connector;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
    metadata: Metadata,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Budget of the whole call, starting when the call is made. Budgets
    /// above [`MAX_TIMEOUT`](crate::MAX_TIMEOUT) are capped to it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(clamp_timeout(timeout));
        self
    }

    /// Cancel the call when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// The two ways a call can be cut short by its caller
struct Interrupt {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl Interrupt {
    fn new(options: &CallOptions) -> Self {
        Self {
            deadline: options.timeout.map(|timeout| Instant::now() + timeout),
            cancellation: options.cancellation.clone(),
        }
    }

    async fn fired(&self) -> Status {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = deadline => Status::deadline_exceeded("client deadline exceeded"),
            _ = cancelled => Status::cancelled("call cancelled by client"),
        }
    }

    /// Run `fut` unless the call is interrupted first
    async fn race<F: Future>(&self, fut: F) -> Result<F::Output, Status> {
        tokio::select! {
            biased;
            output = fut => Ok(output),
            status = self.fired() => Err(status),
        }
    }
}

type Pump = JoinHandle<Result<Option<CallSender>, Status>>;

/// Client channel
///
/// Cloning is cheap; clones share the connection settings.
#[derive(Clone, Debug)]
pub struct Channel {
    connector: Arc<Connector>,
    max_frame_size: usize,
}

impl Channel {
    /// Plain TCP channel with default settings
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RpcError> {
        Self::with_config(ClientConfig::with_endpoint(endpoint))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, RpcError> {
        let connector = Connector::new(&config)?;
        Ok(Self {
            connector: Arc::new(connector),
            max_frame_size: config.max_frame_size,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    /// Make a unary-unary call
    pub async fn unary<Req, Res>(
        &self,
        service_name: &str,
        method_name: &str,
        request: Req,
        options: CallOptions,
    ) -> Result<Res, Status>
    where
        Req: Encoder,
        Res: Decoder,
    {
        let path = method_path(service_name, method_name);
        tracing::debug!(method = %path, "starting unary call");

        let interrupt = Interrupt::new(&options);
        let payload = request.encode()?;
        let (mut sender, mut receiver) = interrupt.race(self.open(&path, &options)).await??;

        let outcome = interrupt
            .race(async {
                sender.send_message(payload).await?;
                sender.half_close().await?;
                receive_unary(&mut receiver).await
            })
            .await;

        match outcome {
            Ok(result) => Res::decode(result?),
            Err(status) => {
                sender.cancel().await;
                Err(status)
            }
        }
    }

    /// Make a unary-stream call
    ///
    /// Dropping the returned stream before it ends cancels the call.
    pub fn unary_stream<Req, Res>(
        &self,
        service_name: &str,
        method_name: &str,
        request: Req,
        options: CallOptions,
    ) -> impl Stream<Item = Result<Res, Status>> + Send + 'static
    where
        Req: Encoder + Send + 'static,
        Res: Decoder + Send + 'static,
    {
        let path = method_path(service_name, method_name);
        let channel = self.clone();

        try_stream! {
            tracing::debug!(method = %path, "starting unary-stream call");

            let interrupt = Interrupt::new(&options);
            let payload = request.encode()?;
            let (mut sender, mut receiver) = interrupt.race(channel.open(&path, &options)).await??;

            let sent = interrupt
                .race(async {
                    sender.send_message(payload).await?;
                    sender.half_close().await
                })
                .await;
            match sent {
                Ok(result) => result?,
                Err(status) => {
                    sender.cancel().await;
                    Err::<(), _>(status)?;
                }
            }

            loop {
                let frame = match interrupt.race(receiver.recv()).await {
                    Ok(frame) => frame.map_err(Status::from)?,
                    Err(status) => {
                        sender.cancel().await;
                        Err::<(), _>(status)?;
                        break;
                    }
                };

                match next_response(frame)? {
                    Some(payload) => yield Res::decode(payload)?,
                    None => break,
                }
            }
        }
    }

    /// Make a stream-unary call
    pub async fn stream_unary<Req, Res>(
        &self,
        service_name: &str,
        method_name: &str,
        request_stream: impl Stream<Item = Req> + Send + 'static,
        options: CallOptions,
    ) -> Result<Res, Status>
    where
        Req: Encoder + Send + 'static,
        Res: Decoder,
    {
        let path = method_path(service_name, method_name);
        tracing::debug!(method = %path, "starting stream-unary call");

        let interrupt = Interrupt::new(&options);
        let (sender, mut receiver) = interrupt.race(self.open(&path, &options)).await??;

        let stop = CancellationToken::new();
        let mut pump = tokio::spawn(pump_requests(sender, request_stream, stop.clone()));

        let outcome = interrupt.race(receive_unary(&mut receiver)).await;
        let pumped = finish_pump(&stop, &mut pump).await;

        match (outcome, pumped) {
            (_, Err(status)) => Err(status),
            (Err(status), Ok(sender)) => {
                if let Some(mut sender) = sender {
                    sender.cancel().await;
                }
                Err(status)
            }
            (Ok(result), Ok(_)) => Res::decode(result?),
        }
    }

    /// Make a stream-stream call
    ///
    /// Requests are sent from a separate task, so the returned stream can be
    /// consumed while requests are still being produced. Dropping it before
    /// it ends cancels the call.
    pub fn stream_stream<Req, Res>(
        &self,
        service_name: &str,
        method_name: &str,
        request_stream: impl Stream<Item = Req> + Send + 'static,
        options: CallOptions,
    ) -> impl Stream<Item = Result<Res, Status>> + Send + 'static
    where
        Req: Encoder + Send + 'static,
        Res: Decoder + Send + 'static,
    {
        let path = method_path(service_name, method_name);
        let channel = self.clone();

        try_stream! {
            tracing::debug!(method = %path, "starting stream-stream call");

            let interrupt = Interrupt::new(&options);
            let (sender, mut receiver) = interrupt.race(channel.open(&path, &options)).await??;

            let stop = CancellationToken::new();
            let _stop_on_drop = stop.clone().drop_guard();
            let mut pump = tokio::spawn(pump_requests(sender, request_stream, stop.clone()));

            loop {
                let frame = match interrupt.race(receiver.recv()).await {
                    Ok(frame) => frame.map_err(Status::from),
                    Err(status) => Err(status),
                };

                let next = frame.and_then(next_response);
                match next {
                    Ok(Some(payload)) => yield Res::decode(payload)?,
                    Ok(None) => {
                        finish_pump(&stop, &mut pump).await?;
                        break;
                    }
                    Err(status) => {
                        if let Some(mut sender) = finish_pump(&stop, &mut pump).await? {
                            sender.cancel().await;
                        }
                        Err::<(), _>(status)?;
                    }
                }
            }
        }
    }

    /// Connect and send the opening frame
    async fn open(
        &self,
        path: &str,
        options: &CallOptions,
    ) -> Result<(CallSender, CallReceiver), Status> {
        let io = self.connector.connect().await?;
        let (mut sender, receiver) = CallChannel::new(io, self.max_frame_size).split();

        let mut metadata = options.metadata.clone();
        if let Some(timeout) = options.timeout {
            metadata.insert(DEADLINE_KEY.to_string(), timeout.as_millis().to_string());
        }

        sender.open(path, metadata).await?;
        Ok((sender, receiver))
    }
}

/// Wait for the single response of a unary-output call
async fn receive_unary(receiver: &mut CallReceiver) -> Result<Vec<u8>, Status> {
    let mut response = None;
    loop {
        let frame = receiver.recv().await?;
        match next_response(frame)? {
            Some(payload) if response.is_none() => response = Some(payload),
            Some(_) => return Err(Status::internal("received more than one response message")),
            None => {
                return response
                    .ok_or_else(|| Status::internal("call completed without a response message"));
            }
        }
    }
}

/// Interpret the next frame from the server: a payload, `None` at the end of
/// a successful call, or the call's error.
fn next_response(frame: Option<Frame>) -> Result<Option<Vec<u8>>, Status> {
    match frame {
        Some(Frame::Message(payload)) => Ok(Some(payload)),
        Some(Frame::Status { code, message }) => {
            let status = Status::from_wire(code, message);
            if status.is_ok() {
                Ok(None)
            } else {
                Err(status)
            }
        }
        Some(frame) => Err(Status::internal(format!(
            "unexpected {} frame from server",
            frame.kind()
        ))),
        None => Err(Status::unavailable("connection closed before the call completed")),
    }
}

/// Send every request then half-close, unless stopped first.
///
/// Returns the sender after a half-close so that the caller can still cancel
/// the call, `None` when the call was already cancelled or the connection
/// failed, and the encoding error of a request that could not be sent.
async fn pump_requests<Req, S>(
    mut sender: CallSender,
    requests: S,
    stop: CancellationToken,
) -> Result<Option<CallSender>, Status>
where
    Req: Encoder + Send + 'static,
    S: Stream<Item = Req> + Send + 'static,
{
    let mut requests = std::pin::pin!(requests);
    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => {
                sender.cancel().await;
                return Ok(None);
            }
            next = requests.next() => next,
        };

        let Some(request) = next else {
            return match sender.half_close().await {
                Ok(()) => Ok(Some(sender)),
                Err(e) => {
                    tracing::debug!(error = %e, "failed to half-close call");
                    Ok(None)
                }
            };
        };

        let payload = match request.encode() {
            Ok(payload) => payload,
            Err(status) => {
                sender.cancel().await;
                return Err(status);
            }
        };

        if let Err(e) = sender.send_message(payload).await {
            tracing::debug!(error = %e, "failed to send request");
            return Ok(None);
        }
    }
}

async fn finish_pump(
    stop: &CancellationToken,
    pump: &mut Pump,
) -> Result<Option<CallSender>, Status> {
    stop.cancel();
    pump.await
        .map_err(|e| Status::internal(format!("request task failed: {}", e)))?
}
