// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors for document collections
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("collection is closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid object id: {0}")]
    InvalidId(String),

    #[error("store error: {0}")]
    Backend(String),
}
