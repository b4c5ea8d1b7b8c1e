// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::StoreError;
use crate::object_id::ObjectId;

/// A stored document: a JSON object whose identity lives in [`ID_FIELD`]
pub type Document = serde_json::Map<String, Value>;

/// Lazily consumed sequence of documents
pub type Cursor = BoxStream<'static, Result<Document, StoreError>>;

pub const ID_FIELD: &str = "_id";

/// A collection of documents keyed by [`ObjectId`]
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Store a new document and return the id it was stored under. An id is
    /// generated when the document has no `_id`.
    async fn insert_one(&self, document: Document) -> Result<Value, StoreError>;

    async fn find_one(&self, id: &ObjectId) -> Result<Option<Document>, StoreError>;

    /// Replace the document stored under `id`, keeping its identity.
    /// Returns the number of matched documents.
    async fn replace_one(&self, id: &ObjectId, document: Document) -> Result<u64, StoreError>;

    /// Returns the number of deleted documents
    async fn delete_one(&self, id: &ObjectId) -> Result<u64, StoreError>;

    /// Every document, in the collection's natural order
    async fn find_all(&self) -> Result<Cursor, StoreError>;

    /// Release the collection. Later operations fail with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::Backend(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
