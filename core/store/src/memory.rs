// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use parking_lot::RwLock;
use serde_json::Value;

use crate::collection::{Collection, Cursor, Document, ID_FIELD};
use crate::errors::StoreError;
use crate::object_id::ObjectId;

/// In-process collection ordered by id, i.e. by insertion time
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: RwLock<BTreeMap<ObjectId, Document>>,
    closed: AtomicBool,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Id carried by a document, if any
fn document_id(document: &Document) -> Result<Option<ObjectId>, StoreError> {
    match document.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => ObjectId::parse_str(id).map(Some),
        Some(other) => Err(StoreError::InvalidId(other.to_string())),
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, mut document: Document) -> Result<Value, StoreError> {
        self.ensure_open()?;

        let id = document_id(&document)?.unwrap_or_default();
        let mut documents = self.documents.write();
        if documents.contains_key(&id) {
            return Err(StoreError::Backend(format!("duplicate key: {}", id)));
        }

        document.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
        documents.insert(id, document);
        tracing::trace!(collection = %self.name, %id, "inserted document");

        Ok(Value::String(id.to_hex()))
    }

    async fn find_one(&self, id: &ObjectId) -> Result<Option<Document>, StoreError> {
        self.ensure_open()?;
        Ok(self.documents.read().get(id).cloned())
    }

    async fn replace_one(&self, id: &ObjectId, mut document: Document) -> Result<u64, StoreError> {
        self.ensure_open()?;

        if let Some(other) = document_id(&document)? {
            if other != *id {
                return Err(StoreError::Backend(format!(
                    "the {} field cannot be changed",
                    ID_FIELD
                )));
            }
        }

        let mut documents = self.documents.write();
        let Some(stored) = documents.get_mut(id) else {
            return Ok(0);
        };
        document.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
        *stored = document;

        Ok(1)
    }

    async fn delete_one(&self, id: &ObjectId) -> Result<u64, StoreError> {
        self.ensure_open()?;
        Ok(self.documents.write().remove(id).map_or(0, |_| 1))
    }

    async fn find_all(&self) -> Result<Cursor, StoreError> {
        self.ensure_open()?;
        let snapshot: Vec<Document> = self.documents.read().values().cloned().collect();
        Ok(stream::iter(snapshot.into_iter().map(Ok)).boxed())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::info!(collection = %self.name, "collection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn doc(title: &str) -> Document {
        let mut document = Document::new();
        document.insert("title".to_string(), Value::from(title));
        document
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let collection = MemoryCollection::new("blog");
        let id = collection.insert_one(doc("first")).await.unwrap();
        let id = ObjectId::parse_str(id.as_str().unwrap()).unwrap();

        let stored = collection.find_one(&id).await.unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&Value::from("first")));
        assert_eq!(stored.get(ID_FIELD), Some(&Value::from(id.to_hex())));
        assert_eq!(collection.len(), 1);

        assert!(collection.find_one(&ObjectId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_with_explicit_id() {
        let collection = MemoryCollection::new("blog");
        let id = ObjectId::new();
        let mut document = doc("explicit");
        document.insert(ID_FIELD.to_string(), Value::from(id.to_hex()));

        let inserted = collection.insert_one(document.clone()).await.unwrap();
        assert_eq!(inserted, Value::from(id.to_hex()));
        assert!(matches!(
            collection.insert_one(document).await,
            Err(StoreError::Backend(_))
        ));

        let mut bad = doc("bad");
        bad.insert(ID_FIELD.to_string(), Value::from(17));
        assert!(matches!(
            collection.insert_one(bad).await,
            Err(StoreError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_keeps_identity() {
        let collection = MemoryCollection::new("blog");
        let id = collection.insert_one(doc("before")).await.unwrap();
        let id = ObjectId::parse_str(id.as_str().unwrap()).unwrap();

        assert_eq!(collection.replace_one(&id, doc("after")).await.unwrap(), 1);
        let stored = collection.find_one(&id).await.unwrap().unwrap();
        assert_eq!(stored.get("title"), Some(&Value::from("after")));
        assert_eq!(stored.get(ID_FIELD), Some(&Value::from(id.to_hex())));

        assert_eq!(
            collection.replace_one(&ObjectId::new(), doc("x")).await.unwrap(),
            0
        );

        let mut moved = doc("moved");
        moved.insert(ID_FIELD.to_string(), Value::from(ObjectId::new().to_hex()));
        assert!(collection.replace_one(&id, moved).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_find_all_order() {
        let collection = MemoryCollection::new("blog");
        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            let id = collection.insert_one(doc(title)).await.unwrap();
            ids.push(ObjectId::parse_str(id.as_str().unwrap()).unwrap());
        }

        assert_eq!(collection.delete_one(&ids[1]).await.unwrap(), 1);
        assert_eq!(collection.delete_one(&ids[1]).await.unwrap(), 0);

        let titles: Vec<Value> = collection
            .find_all()
            .await
            .unwrap()
            .map_ok(|d| d["title"].clone())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(titles, vec![Value::from("a"), Value::from("c")]);
    }

    #[tokio::test]
    async fn test_closed_collection() {
        let collection = MemoryCollection::new("blog");
        collection.close().await.unwrap();
        assert!(collection.is_closed());

        assert!(matches!(
            collection.insert_one(doc("late")).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(collection.find_all().await, Err(StoreError::Closed)));
        // closing twice is fine
        collection.close().await.unwrap();
    }
}
