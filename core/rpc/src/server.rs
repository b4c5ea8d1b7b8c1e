// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Server-side RPC handling implementation
//!
//! Provides a Server type that accepts calls, dispatches them to registered
//! handlers and terminates each of them with exactly one status.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::Stream;
use futures::{FutureExt, StreamExt, future::BoxFuture, stream::BoxStream};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::call::{CallChannel, CallReceiver, CallSender};
use crate::codec::{Decoder, Encoder};
use crate::common::{method_path, split_method_path};
use crate::config::ServerConfig;
use crate::context::Context;
use crate::error::RpcError;
use crate::frame::Frame;
use crate::status::Status;
use crate::transport::{Incoming, Listener};

pub type Item = Vec<u8>;
pub type ItemStream = BoxStream<'static, Result<Item, Status>>;

/// Typed request sequence handed to stream-input handlers
pub type RequestStream<T> = BoxStream<'static, Result<T, Status>>;

/// Typed response sequence returned by stream-output handlers
pub type ResponseStream<T> = BoxStream<'static, Result<T, Status>>;

pub type HandlerFuture = BoxFuture<'static, Result<HandlerResponse, Status>>;

/// Handler function type for RPC methods (unary input)
pub type RpcHandler = Arc<dyn Fn(Item, Context) -> HandlerFuture + Send + Sync>;

/// Handler function type for stream-input RPC methods
pub type StreamRpcHandler = Arc<dyn Fn(ItemStream, Context) -> HandlerFuture + Send + Sync>;

/// Response from an RPC handler
pub enum HandlerResponse {
    /// Single response message
    Unary(Item),
    /// Stream of response messages
    Stream(ItemStream),
}

/// Interaction pattern of a method, fixed at registration
#[derive(Clone)]
pub enum HandlerType {
    /// Unary request, unary response
    UnaryUnary(RpcHandler),
    /// Unary request, streaming response
    UnaryStream(RpcHandler),
    /// Streaming request, unary response
    StreamUnary(StreamRpcHandler),
    /// Streaming request, streaming response
    StreamStream(StreamRpcHandler),
}

impl HandlerType {
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerType::UnaryUnary(_) => "unary-unary",
            HandlerType::UnaryStream(_) => "unary-stream",
            HandlerType::StreamUnary(_) => "stream-unary",
            HandlerType::StreamStream(_) => "stream-stream",
        }
    }
}

impl std::fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// Registry for RPC service methods
#[derive(Default)]
struct ServiceRegistry {
    /// Map of method paths to handlers
    handlers: HashMap<String, HandlerType>,
}

impl ServiceRegistry {
    fn insert(&mut self, method_path: String, handler: HandlerType) -> Result<(), RpcError> {
        if self.handlers.contains_key(&method_path) {
            return Err(RpcError::DuplicateMethod(method_path));
        }
        tracing::debug!(%method_path, kind = handler.kind(), "registered method");
        self.handlers.insert(method_path, handler);
        Ok(())
    }

    fn get(&self, method_path: &str) -> Option<HandlerType> {
        self.handlers.get(method_path).cloned()
    }

    fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }
}

struct ServerInner {
    config: ServerConfig,
    registry: RwLock<ServiceRegistry>,
    /// Stops the accept loop
    cancellation_token: CancellationToken,
    /// Parent of every call context, cancelled when draining times out
    calls_token: CancellationToken,
    drain: Mutex<Option<(drain::Signal, drain::Watch)>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

/// RPC server
///
/// Cloning is cheap: clones share the registry and the lifecycle.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("endpoint", &self.inner.config.endpoint)
            .field("local_addr", &self.local_addr())
            .field("methods", &self.methods())
            .finish()
    }
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let (signal, watch) = drain::channel();
        Self {
            inner: Arc::new(ServerInner {
                config,
                registry: RwLock::new(ServiceRegistry::default()),
                cancellation_token: CancellationToken::new(),
                calls_token: CancellationToken::new(),
                drain: Mutex::new(Some((signal, watch))),
                local_addr: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Address the server is bound to, once serving
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock()
    }

    /// Registered `Service/Method` paths, sorted
    pub fn methods(&self) -> Vec<String> {
        self.inner.registry.read().methods()
    }

    /// Register a unary-unary handler
    pub fn register_unary_unary<F, Req, Res, Fut>(
        &self,
        service_name: &str,
        method_name: &str,
        handler: F,
    ) -> Result<(), RpcError>
    where
        F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, Status>> + Send + 'static,
        Req: Decoder + Send + 'static,
        Res: Encoder + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapper: RpcHandler = Arc::new(move |bytes: Item, ctx: Context| {
            let handler = Arc::clone(&handler);
            async move {
                let request = Req::decode(bytes)?;
                let response = handler(request, ctx).await?;
                Ok(HandlerResponse::Unary(response.encode()?))
            }
            .boxed()
        });

        self.register(service_name, method_name, HandlerType::UnaryUnary(wrapper))
    }

    /// Register a unary-stream handler
    pub fn register_unary_stream<F, Req, Res, S, Fut>(
        &self,
        service_name: &str,
        method_name: &str,
        handler: F,
    ) -> Result<(), RpcError>
    where
        F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Res, Status>> + Send + 'static,
        Req: Decoder + Send + 'static,
        Res: Encoder + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapper: RpcHandler = Arc::new(move |bytes: Item, ctx: Context| {
            let handler = Arc::clone(&handler);
            async move {
                let request = Req::decode(bytes)?;
                let responses = handler(request, ctx).await?;
                Ok(HandlerResponse::Stream(encode_stream(responses)))
            }
            .boxed()
        });

        self.register(service_name, method_name, HandlerType::UnaryStream(wrapper))
    }

    /// Register a stream-unary handler
    pub fn register_stream_unary<F, Req, Res, Fut>(
        &self,
        service_name: &str,
        method_name: &str,
        handler: F,
    ) -> Result<(), RpcError>
    where
        F: Fn(RequestStream<Req>, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, Status>> + Send + 'static,
        Req: Decoder + Send + 'static,
        Res: Encoder + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapper: StreamRpcHandler = Arc::new(move |items: ItemStream, ctx: Context| {
            let handler = Arc::clone(&handler);
            async move {
                let response = handler(decode_stream(items), ctx).await?;
                Ok(HandlerResponse::Unary(response.encode()?))
            }
            .boxed()
        });

        self.register(service_name, method_name, HandlerType::StreamUnary(wrapper))
    }

    /// Register a stream-stream handler
    pub fn register_stream_stream<F, Req, Res, S, Fut>(
        &self,
        service_name: &str,
        method_name: &str,
        handler: F,
    ) -> Result<(), RpcError>
    where
        F: Fn(RequestStream<Req>, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<Res, Status>> + Send + 'static,
        Req: Decoder + Send + 'static,
        Res: Encoder + Send + 'static,
    {
        let handler = Arc::new(handler);
        let wrapper: StreamRpcHandler = Arc::new(move |items: ItemStream, ctx: Context| {
            let handler = Arc::clone(&handler);
            async move {
                let responses = handler(decode_stream(items), ctx).await?;
                Ok(HandlerResponse::Stream(encode_stream(responses)))
            }
            .boxed()
        });

        self.register(service_name, method_name, HandlerType::StreamStream(wrapper))
    }

    fn register(
        &self,
        service_name: &str,
        method_name: &str,
        handler: HandlerType,
    ) -> Result<(), RpcError> {
        self.inner
            .registry
            .write()
            .insert(method_path(service_name, method_name), handler)
    }

    /// Bind the listener and start accepting calls in a background task.
    ///
    /// Returns once the listener is bound, so [`local_addr`](Self::local_addr)
    /// is available right away.
    pub async fn serve(&self) -> Result<JoinHandle<()>, RpcError> {
        let watch = self
            .inner
            .drain
            .lock()
            .as_ref()
            .map(|(_, watch)| watch.clone())
            .ok_or(RpcError::NotRunning)?;

        let listener = Listener::bind(&self.inner.config).await?;
        let local_addr = listener.local_addr()?;
        *self.inner.local_addr.lock() = Some(local_addr);

        tracing::info!(
            %local_addr,
            tls = listener.is_tls(),
            methods = ?self.methods(),
            "server listening"
        );

        let server = self.clone();
        Ok(tokio::spawn(async move {
            server.accept_loop(listener, watch).await
        }))
    }

    async fn accept_loop(self, listener: Listener, watch: drain::Watch) {
        loop {
            tokio::select! {
                _ = self.inner.cancellation_token.cancelled() => {
                    tracing::info!("server stopped accepting calls");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((incoming, peer)) => {
                        let server = self.clone();
                        let watch = watch.clone();
                        tokio::spawn(async move {
                            server.handle_connection(incoming, peer).await;
                            drop(watch);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                    }
                }
            }
        }
    }

    /// Stop accepting calls and drain the in-flight ones.
    ///
    /// Calls still running after `grace` are cancelled and end with
    /// `Unavailable`.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!("shutting down server");
        self.inner.cancellation_token.cancel();

        let Some((signal, watch)) = self.inner.drain.lock().take() else {
            tracing::debug!("server already shut down");
            return;
        };
        drop(watch);

        let drained = signal.drain();
        tokio::pin!(drained);

        tokio::select! {
            _ = &mut drained => {
                tracing::info!("all calls drained");
                return;
            }
            _ = tokio::time::sleep(grace) => {}
        }

        tracing::warn!(?grace, "drain timeout expired, cancelling in-flight calls");
        self.inner.calls_token.cancel();
        drained.await;
        tracing::info!("all calls drained");
    }

    async fn handle_connection(&self, incoming: Incoming, peer: SocketAddr) {
        let max_frame_size = self.inner.config.max_frame_size;
        let setup = async {
            let io = incoming.establish().await?;
            let (sender, mut receiver) = CallChannel::new(io, max_frame_size).split();
            let first = receiver.recv().await;
            Ok::<_, RpcError>((sender, receiver, first))
        };

        let (mut sender, receiver, first) = tokio::select! {
            result = setup => match result {
                Ok(parts) => parts,
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "failed to establish connection");
                    return;
                }
            },
            _ = self.inner.calls_token.cancelled() => return,
        };

        let (method, status) = match first {
            Ok(Some(Frame::Open { method, metadata })) => {
                let status = self
                    .handle_call(&method, metadata, peer, &mut sender, receiver)
                    .await;
                (method, status)
            }
            Ok(Some(frame)) => (
                String::new(),
                Status::invalid_argument(format!("expected open frame, got {}", frame.kind())),
            ),
            Ok(None) => {
                tracing::debug!(%peer, "connection closed before the call was opened");
                return;
            }
            Err(e) => (
                String::new(),
                Status::invalid_argument(format!("malformed open frame: {}", e)),
            ),
        };

        if status.is_ok() {
            tracing::debug!(%method, %peer, "call completed");
        } else {
            tracing::debug!(
                %method,
                %peer,
                code = %status.code(),
                message = status.message().unwrap_or_default(),
                "call failed"
            );
        }

        if let Err(e) = sender.send_status(&status).await {
            tracing::debug!(%method, error = %e, "failed to send status");
        }
        if let Err(e) = sender.close().await {
            tracing::debug!(%method, error = %e, "failed to close call");
        }
    }

    /// Run one call to completion and produce its terminal status
    async fn handle_call(
        &self,
        method: &str,
        metadata: crate::Metadata,
        peer: SocketAddr,
        sender: &mut CallSender,
        receiver: CallReceiver,
    ) -> Status {
        if let Err(status) = split_method_path(method) {
            return status;
        }

        let Some(handler) = self.inner.registry.read().get(method) else {
            return Status::unimplemented(format!("method not found: {}", method));
        };

        let ctx = Context::for_call(method, peer, metadata, &self.inner.calls_token);
        if ctx.is_deadline_exceeded() {
            return Status::deadline_exceeded("deadline exceeded before the call started");
        }

        tracing::debug!(%method, %peer, kind = handler.kind(), "processing call");

        let (tx, rx) = mpsc::channel(self.inner.config.channel_capacity);
        let reader = tokio::spawn(read_requests(
            receiver,
            tx,
            ctx.cancellation_token().clone(),
        ));
        let requests = ReceiverStream::new(rx).boxed();

        let status = tokio::select! {
            result = dispatch(handler, requests, ctx.clone(), sender) => match result {
                Ok(()) => Status::ok(),
                Err(status) => status,
            },
            status = ctx.done() => {
                if self.inner.calls_token.is_cancelled() {
                    Status::unavailable("server is shutting down")
                } else {
                    status
                }
            }
        };

        reader.abort();
        status
    }
}

/// Outcome of one step of the request reader
enum ReadStep {
    Delivered,
    HandlerGone,
    Received(Result<Option<Frame>, RpcError>),
}

/// Feed inbound messages to the handler and watch for the caller going away.
///
/// When the handler falls behind, up to one channel's worth of messages is
/// read ahead and held, so a `Cancel` or disconnect queued behind them is
/// still seen.
async fn read_requests(
    mut receiver: CallReceiver,
    tx: mpsc::Sender<Result<Item, Status>>,
    cancellation: CancellationToken,
) {
    let read_ahead = tx.max_capacity();
    let mut tx = Some(tx);
    let mut pending: VecDeque<Item> = VecDeque::new();
    let mut half_closed = false;

    loop {
        if half_closed && pending.is_empty() {
            // ends the handler's request stream
            tx = None;
        }

        let step = match &tx {
            Some(sender) if !pending.is_empty() => {
                if pending.len() >= read_ahead {
                    deliver(sender, &mut pending).await
                } else {
                    tokio::select! {
                        step = deliver(sender, &mut pending) => step,
                        frame = receiver.recv() => ReadStep::Received(frame),
                    }
                }
            }
            _ => ReadStep::Received(receiver.recv().await),
        };

        let frame = match step {
            ReadStep::Delivered => continue,
            ReadStep::HandlerGone => {
                // the handler no longer reads requests
                tx = None;
                pending.clear();
                continue;
            }
            ReadStep::Received(frame) => frame,
        };

        match frame {
            Ok(Some(Frame::Message(payload))) => {
                if tx.is_some() {
                    pending.push_back(payload);
                }
            }
            Ok(Some(Frame::HalfClose)) => {
                half_closed = true;
            }
            Ok(Some(Frame::Cancel)) | Ok(None) => {
                tracing::debug!("caller cancelled the call");
                cancellation.cancel();
                return;
            }
            Ok(Some(frame)) => {
                let status =
                    Status::invalid_argument(format!("unexpected {} frame", frame.kind()));
                fail_requests(tx.take(), pending, status, &cancellation).await;
                return;
            }
            Err(e) => {
                let status = match e {
                    RpcError::Io(e) => Status::unavailable(format!("transport error: {}", e)),
                    other => Status::invalid_argument(other.to_string()),
                };
                fail_requests(tx.take(), pending, status, &cancellation).await;
                return;
            }
        }
    }
}

/// Hand the oldest held message to the handler once it has room for it
async fn deliver(
    sender: &mpsc::Sender<Result<Item, Status>>,
    pending: &mut VecDeque<Item>,
) -> ReadStep {
    match sender.reserve().await {
        Ok(permit) => {
            if let Some(payload) = pending.pop_front() {
                permit.send(Ok(payload));
            }
            ReadStep::Delivered
        }
        Err(_) => ReadStep::HandlerGone,
    }
}

/// Report a broken request direction to the handler after the messages
/// already read, or cancel the call when the handler no longer listens.
async fn fail_requests(
    tx: Option<mpsc::Sender<Result<Item, Status>>>,
    pending: VecDeque<Item>,
    status: Status,
    cancellation: &CancellationToken,
) {
    if let Some(tx) = tx {
        let mut delivered = true;
        for payload in pending {
            if tx.send(Ok(payload)).await.is_err() {
                delivered = false;
                break;
            }
        }
        if delivered && tx.send(Err(status)).await.is_ok() {
            return;
        }
    }
    cancellation.cancel();
}

async fn dispatch(
    handler: HandlerType,
    requests: ItemStream,
    ctx: Context,
    sender: &mut CallSender,
) -> Result<(), Status> {
    let response = match handler {
        HandlerType::UnaryUnary(handler) | HandlerType::UnaryStream(handler) => {
            let request = single_request(requests).await?;
            handler(request, ctx).await?
        }
        HandlerType::StreamUnary(handler) | HandlerType::StreamStream(handler) => {
            handler(requests, ctx).await?
        }
    };

    match response {
        HandlerResponse::Unary(payload) => Ok(sender.send_message(payload).await?),
        HandlerResponse::Stream(stream) => send_response_stream(sender, stream).await,
    }
}

/// Exactly one request message, followed by the caller's half-close
async fn single_request(mut requests: ItemStream) -> Result<Item, Status> {
    let request = requests
        .next()
        .await
        .ok_or_else(|| Status::invalid_argument("missing request message"))??;

    match requests.next().await {
        None => Ok(request),
        Some(Ok(_)) => Err(Status::invalid_argument(
            "expected a single request message",
        )),
        Some(Err(status)) => Err(status),
    }
}

/// Send all responses from a stream
async fn send_response_stream(
    sender: &mut CallSender,
    mut stream: ItemStream,
) -> Result<(), Status> {
    while let Some(item) = stream.next().await {
        sender.send_message(item?).await?;
    }
    Ok(())
}

fn decode_stream<Req: Decoder + Send + 'static>(items: ItemStream) -> RequestStream<Req> {
    items
        .map(|item| item.and_then(|bytes| Req::decode(bytes)))
        .boxed()
}

fn encode_stream<Res, S>(responses: S) -> ItemStream
where
    Res: Encoder + Send + 'static,
    S: Stream<Item = Result<Res, Status>> + Send + 'static,
{
    responses
        .map(|response| response.and_then(Encoder::encode))
        .boxed()
}
