// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Request and response messages of the demo services.

use bincode::{Decode, Encode};
use callwire_rpc::bincode_message;

// Greet

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct Greeting {
    pub first_name: String,
    pub last_name: String,
}

impl Greeting {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// Request of every greet method
#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct GreetRequest {
    pub greeting: Greeting,
}

impl From<Greeting> for GreetRequest {
    fn from(greeting: Greeting) -> Self {
        Self { greeting }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct GreetResponse {
    pub result: String,
}

// Calculator

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct SumRequest {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct SumResponse {
    pub result: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct PrimeNumberDecompositionRequest {
    pub number: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct PrimeNumberDecompositionResponse {
    pub prime_factor: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct ComputeAverageRequest {
    pub number: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct ComputeAverageResponse {
    pub average: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct FindMaximumRequest {
    pub number: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct FindMaximumResponse {
    pub maximum: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct SquareRootRequest {
    pub number: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct SquareRootResponse {
    pub number_root: f64,
}

// Blog

/// A blog post as seen by callers. An empty `id` means the post was never
/// stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Blog {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl Blog {
    pub fn new(
        author_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            author_id: author_id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct CreateBlogRequest {
    pub blog: Blog,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct CreateBlogResponse {
    pub blog: Blog,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct ReadBlogRequest {
    pub blog_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct ReadBlogResponse {
    pub blog: Blog,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct UpdateBlogRequest {
    pub blog: Blog,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct UpdateBlogResponse {
    pub blog: Blog,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct DeleteBlogRequest {
    pub blog_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct DeleteBlogResponse {
    pub blog_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct ListBlogRequest {}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct ListBlogResponse {
    pub blog: Blog,
}

bincode_message!(
    GreetRequest,
    GreetResponse,
    SumRequest,
    SumResponse,
    PrimeNumberDecompositionRequest,
    PrimeNumberDecompositionResponse,
    ComputeAverageRequest,
    ComputeAverageResponse,
    FindMaximumRequest,
    FindMaximumResponse,
    SquareRootRequest,
    SquareRootResponse,
    CreateBlogRequest,
    CreateBlogResponse,
    ReadBlogRequest,
    ReadBlogResponse,
    UpdateBlogRequest,
    UpdateBlogResponse,
    DeleteBlogRequest,
    DeleteBlogResponse,
    ListBlogRequest,
    ListBlogResponse,
);
