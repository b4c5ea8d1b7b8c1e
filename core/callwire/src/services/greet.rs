// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::{debug, info};

use callwire_rpc::{
    CallOptions, Channel, Context, RequestStream, ResponseStream, RpcError, Server, Status,
};

use crate::messages::{GreetRequest, GreetResponse};

pub const SERVICE_NAME: &str = "greet.GreetService";

/// Responses sent by `GreetManyTimes`
pub const GREET_MANY_TIMES_COUNT: usize = 10;

/// Simulated work steps of `GreetWithDeadline`
pub const GREET_WITH_DEADLINE_STEPS: usize = 3;

#[derive(Debug, Clone)]
pub struct GreetService {
    /// Pause between streamed greetings and between work steps
    step: Duration,
}

impl Default for GreetService {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(1),
        }
    }
}

impl GreetService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(step: Duration) -> Self {
        Self { step }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn register(&self, server: &Server) -> Result<(), RpcError> {
        let step = self.step;

        server.register_unary_unary(SERVICE_NAME, "Greet", greet)?;
        server.register_unary_stream(
            SERVICE_NAME,
            "GreetManyTimes",
            move |request: GreetRequest, ctx: Context| async move {
                Ok::<_, Status>(greet_many_times(request, ctx, step))
            },
        )?;
        server.register_stream_unary(SERVICE_NAME, "LongGreet", long_greet)?;
        server.register_stream_stream(SERVICE_NAME, "GreetEveryone", greet_everyone)?;
        server.register_unary_unary(
            SERVICE_NAME,
            "GreetWithDeadline",
            move |request: GreetRequest, ctx: Context| greet_with_deadline(request, ctx, step),
        )?;

        Ok(())
    }
}

async fn greet(request: GreetRequest, _ctx: Context) -> Result<GreetResponse, Status> {
    debug!(?request, "Greet called");
    Ok(GreetResponse {
        result: format!("Hello, {}", request.greeting.first_name),
    })
}

fn greet_many_times(
    request: GreetRequest,
    ctx: Context,
    step: Duration,
) -> ResponseStream<GreetResponse> {
    debug!(?request, "GreetManyTimes called");
    let first_name = request.greeting.first_name;

    try_stream! {
        for i in 0..GREET_MANY_TIMES_COUNT {
            ctx.check()?;
            if i > 0 {
                tokio::time::sleep(step).await;
            }
            yield GreetResponse {
                result: format!("Hello {} number {}", first_name, i),
            };
        }
    }
    .boxed()
}

async fn long_greet(
    mut requests: RequestStream<GreetRequest>,
    _ctx: Context,
) -> Result<GreetResponse, Status> {
    debug!("LongGreet called");

    let mut result = String::from("Hello, ");
    while let Some(request) = requests.next().await {
        result.push_str(&request?.greeting.first_name);
        result.push_str("! ");
    }

    Ok(GreetResponse { result })
}

async fn greet_everyone(
    requests: RequestStream<GreetRequest>,
    _ctx: Context,
) -> Result<ResponseStream<GreetResponse>, Status> {
    debug!("GreetEveryone called");

    Ok(requests
        .map(|request| {
            request.map(|request| GreetResponse {
                result: format!("Hello, {}!", request.greeting.first_name),
            })
        })
        .boxed())
}

async fn greet_with_deadline(
    request: GreetRequest,
    ctx: Context,
    step: Duration,
) -> Result<GreetResponse, Status> {
    debug!(?request, remaining = ?ctx.remaining_time(), "GreetWithDeadline called");

    for _ in 0..GREET_WITH_DEADLINE_STEPS {
        if let Err(status) = ctx.check() {
            info!(%status, "GreetWithDeadline stopped early");
            return Err(status);
        }
        tokio::time::sleep(step).await;
    }

    Ok(GreetResponse {
        result: format!("Hello, {}", request.greeting.first_name),
    })
}

/// Typed client of the greet service
#[derive(Debug, Clone)]
pub struct GreetClient {
    channel: Channel,
}

impl GreetClient {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub async fn greet(
        &self,
        request: GreetRequest,
        options: CallOptions,
    ) -> Result<GreetResponse, Status> {
        self.channel
            .unary(SERVICE_NAME, "Greet", request, options)
            .await
    }

    pub fn greet_many_times(
        &self,
        request: GreetRequest,
        options: CallOptions,
    ) -> impl Stream<Item = Result<GreetResponse, Status>> + Send + 'static {
        self.channel
            .unary_stream(SERVICE_NAME, "GreetManyTimes", request, options)
    }

    pub async fn long_greet(
        &self,
        requests: impl Stream<Item = GreetRequest> + Send + 'static,
        options: CallOptions,
    ) -> Result<GreetResponse, Status> {
        self.channel
            .stream_unary(SERVICE_NAME, "LongGreet", requests, options)
            .await
    }

    pub fn greet_everyone(
        &self,
        requests: impl Stream<Item = GreetRequest> + Send + 'static,
        options: CallOptions,
    ) -> impl Stream<Item = Result<GreetResponse, Status>> + Send + 'static {
        self.channel
            .stream_stream(SERVICE_NAME, "GreetEveryone", requests, options)
    }

    pub async fn greet_with_deadline(
        &self,
        request: GreetRequest,
        options: CallOptions,
    ) -> Result<GreetResponse, Status> {
        self.channel
            .unary(SERVICE_NAME, "GreetWithDeadline", request, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Greeting;
    use callwire_rpc::Code;
    use futures::stream;

    fn request(first_name: &str) -> GreetRequest {
        Greeting::new(first_name, "Doe").into()
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_greet_handlers() {
        let response = greet(request("Ada"), Context::new("Greet")).await.unwrap();
        assert_eq!(response.result, "Hello, Ada");

        let requests = stream::iter(vec![Ok(request("Ada")), Ok(request("Bob"))]).boxed();
        let response = long_greet(requests, Context::new("LongGreet")).await.unwrap();
        assert_eq!(response.result, "Hello, Ada! Bob! ");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_greet_many_times_stops_when_cancelled() {
        let ctx = Context::new("GreetManyTimes");
        let mut responses = greet_many_times(request("Ada"), ctx.clone(), Duration::ZERO);

        let first = responses.next().await.unwrap().unwrap();
        assert_eq!(first.result, "Hello Ada number 0");

        ctx.cancel();
        let status = responses.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Cancelled);
        assert!(responses.next().await.is_none());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_greet_with_deadline_checks_each_step() {
        let ctx = Context::new("GreetWithDeadline").with_timeout(Duration::from_millis(50));
        let status = greet_with_deadline(request("Ada"), ctx, Duration::from_millis(40))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::DeadlineExceeded);

        let response = greet_with_deadline(
            request("Ada"),
            Context::new("GreetWithDeadline"),
            Duration::from_millis(1),
        )
        .await
        .unwrap();
        assert_eq!(response.result, "Hello, Ada");
    }
}
