// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

mod common;

use futures::{StreamExt, stream};

use callwire::messages::{
    ComputeAverageRequest, FindMaximumRequest, PrimeNumberDecompositionRequest,
    SquareRootRequest, SumRequest, SumResponse,
};
use callwire::services::CalculatorClient;
use callwire::services::calculator::SERVICE_NAME;
use callwire_rpc::{CallOptions, Code};

use common::TestEnv;

#[tokio::test]
#[tracing_test::traced_test]
async fn test_sum() {
    let mut env = TestEnv::start().await;
    let client = CalculatorClient::new(env.channel.clone());

    let response = client
        .sum(SumRequest { x: 3, y: 10 }, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(response.result, 13);

    // no overflow at the edges of i32
    let response = client
        .sum(
            SumRequest {
                x: i32::MAX,
                y: i32::MAX,
            },
            CallOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.result, 2 * i64::from(i32::MAX));

    env.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_prime_number_decomposition() {
    let mut env = TestEnv::start().await;
    let client = CalculatorClient::new(env.channel.clone());

    let factors: Vec<i64> = client
        .prime_number_decomposition(
            PrimeNumberDecompositionRequest { number: 120 },
            CallOptions::new(),
        )
        .map(|response| response.unwrap().prime_factor)
        .collect()
        .await;
    assert_eq!(factors, vec![2, 2, 2, 3, 5]);

    // nothing to decompose is an empty, successful stream
    let factors: Vec<_> = client
        .prime_number_decomposition(
            PrimeNumberDecompositionRequest { number: 1 },
            CallOptions::new(),
        )
        .collect()
        .await;
    assert!(factors.is_empty());

    env.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_compute_average() {
    let mut env = TestEnv::start().await;
    let client = CalculatorClient::new(env.channel.clone());

    let requests = stream::iter([1, 2, 3, 4].map(|number| ComputeAverageRequest { number }));
    let response = client
        .compute_average(requests, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(response.average, 2.5);

    env.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_compute_average_of_nothing_is_zero() {
    let mut env = TestEnv::start().await;
    let client = CalculatorClient::new(env.channel.clone());

    let response = client
        .compute_average(stream::empty::<ComputeAverageRequest>(), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(response.average, 0.0);

    env.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_find_maximum() {
    let mut env = TestEnv::start().await;
    let client = CalculatorClient::new(env.channel.clone());

    let requests = stream::iter([1, 5, 3, 6, 2, 20].map(|number| FindMaximumRequest { number }));
    let maxima: Vec<i32> = client
        .find_maximum(requests, CallOptions::new())
        .map(|response| response.unwrap().maximum)
        .collect()
        .await;
    assert_eq!(maxima, vec![1, 5, 6, 20]);

    env.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_square_root() {
    let mut env = TestEnv::start().await;
    let client = CalculatorClient::new(env.channel.clone());

    let response = client
        .square_root(SquareRootRequest { number: 64 }, CallOptions::new())
        .await
        .unwrap();
    assert_eq!(response.number_root, 8.0);

    let status = client
        .square_root(SquareRootRequest { number: -4 }, CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().unwrap().contains("-4"));

    env.stop().await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_unknown_method() {
    let mut env = TestEnv::start().await;

    let status = env
        .channel
        .unary::<_, SumResponse>(
            SERVICE_NAME,
            "Multiply",
            SumRequest { x: 2, y: 3 },
            CallOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    env.stop().await;
}
