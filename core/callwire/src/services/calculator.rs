// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use async_stream::try_stream;
use futures::{Stream, StreamExt, stream};
use tracing::debug;

use callwire_rpc::{
    CallOptions, Channel, Context, RequestStream, ResponseStream, RpcError, Server, Status,
};

use crate::messages::{
    ComputeAverageRequest, ComputeAverageResponse, FindMaximumRequest, FindMaximumResponse,
    PrimeNumberDecompositionRequest, PrimeNumberDecompositionResponse, SquareRootRequest,
    SquareRootResponse, SumRequest, SumResponse,
};

pub const SERVICE_NAME: &str = "calculator.CalculatorService";

#[derive(Debug, Clone, Default)]
pub struct CalculatorService;

impl CalculatorService {
    pub fn new() -> Self {
        Self
    }

    pub fn register(&self, server: &Server) -> Result<(), RpcError> {
        server.register_unary_unary(SERVICE_NAME, "Sum", sum)?;
        server.register_unary_stream(
            SERVICE_NAME,
            "PrimeNumberDecomposition",
            prime_number_decomposition,
        )?;
        server.register_stream_unary(SERVICE_NAME, "ComputeAverage", compute_average)?;
        server.register_stream_stream(SERVICE_NAME, "FindMaximum", find_maximum)?;
        server.register_unary_unary(SERVICE_NAME, "SquareRoot", square_root)?;
        Ok(())
    }
}

async fn sum(request: SumRequest, _ctx: Context) -> Result<SumResponse, Status> {
    debug!(?request, "Sum called");
    Ok(SumResponse {
        result: i64::from(request.x) + i64::from(request.y),
    })
}

/// Prime factors of `number` in ascending order, with repetition. Numbers
/// below 2 have none.
pub fn prime_factors(mut number: i64) -> Vec<i64> {
    let mut factors = Vec::new();
    let mut divisor = 2i64;

    while number > 1 {
        if divisor.saturating_mul(divisor) > number {
            factors.push(number);
            break;
        }
        if number % divisor == 0 {
            factors.push(divisor);
            number /= divisor;
        } else {
            divisor += 1;
        }
    }

    factors
}

async fn prime_number_decomposition(
    request: PrimeNumberDecompositionRequest,
    _ctx: Context,
) -> Result<ResponseStream<PrimeNumberDecompositionResponse>, Status> {
    debug!(?request, "PrimeNumberDecomposition called");

    let factors = prime_factors(request.number)
        .into_iter()
        .map(|prime_factor| Ok(PrimeNumberDecompositionResponse { prime_factor }));
    Ok(stream::iter(factors).boxed())
}

/// The average of no numbers is 0.
async fn compute_average(
    mut requests: RequestStream<ComputeAverageRequest>,
    _ctx: Context,
) -> Result<ComputeAverageResponse, Status> {
    let mut sum = 0i64;
    let mut count = 0u64;

    while let Some(request) = requests.next().await {
        sum += i64::from(request?.number);
        count += 1;
    }
    debug!(%sum, %count, "ComputeAverage completed");

    let average = if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    };
    Ok(ComputeAverageResponse { average })
}

/// Emits the running maximum each time it changes.
async fn find_maximum(
    requests: RequestStream<FindMaximumRequest>,
    _ctx: Context,
) -> Result<ResponseStream<FindMaximumResponse>, Status> {
    Ok(running_maximum(requests).boxed())
}

fn running_maximum(
    mut requests: RequestStream<FindMaximumRequest>,
) -> impl Stream<Item = Result<FindMaximumResponse, Status>> + Send + 'static {
    try_stream! {
        let mut maximum: Option<i32> = None;
        while let Some(request) = requests.next().await {
            let number = request?.number;
            if maximum.is_none_or(|current| number > current) {
                maximum = Some(number);
                yield FindMaximumResponse { maximum: number };
            }
        }
    }
}

async fn square_root(
    request: SquareRootRequest,
    _ctx: Context,
) -> Result<SquareRootResponse, Status> {
    if request.number < 0 {
        return Err(Status::invalid_argument(format!(
            "Received a negative number: {}",
            request.number
        )));
    }

    Ok(SquareRootResponse {
        number_root: f64::from(request.number).sqrt(),
    })
}

/// Typed client of the calculator service
#[derive(Debug, Clone)]
pub struct CalculatorClient {
    channel: Channel,
}

impl CalculatorClient {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub async fn sum(
        &self,
        request: SumRequest,
        options: CallOptions,
    ) -> Result<SumResponse, Status> {
        self.channel.unary(SERVICE_NAME, "Sum", request, options).await
    }

    pub fn prime_number_decomposition(
        &self,
        request: PrimeNumberDecompositionRequest,
        options: CallOptions,
    ) -> impl Stream<Item = Result<PrimeNumberDecompositionResponse, Status>> + Send + 'static {
        self.channel
            .unary_stream(SERVICE_NAME, "PrimeNumberDecomposition", request, options)
    }

    pub async fn compute_average(
        &self,
        requests: impl Stream<Item = ComputeAverageRequest> + Send + 'static,
        options: CallOptions,
    ) -> Result<ComputeAverageResponse, Status> {
        self.channel
            .stream_unary(SERVICE_NAME, "ComputeAverage", requests, options)
            .await
    }

    pub fn find_maximum(
        &self,
        requests: impl Stream<Item = FindMaximumRequest> + Send + 'static,
        options: CallOptions,
    ) -> impl Stream<Item = Result<FindMaximumResponse, Status>> + Send + 'static {
        self.channel
            .stream_stream(SERVICE_NAME, "FindMaximum", requests, options)
    }

    pub async fn square_root(
        &self,
        request: SquareRootRequest,
        options: CallOptions,
    ) -> Result<SquareRootResponse, Status> {
        self.channel
            .unary(SERVICE_NAME, "SquareRoot", request, options)
            .await
    }
}
