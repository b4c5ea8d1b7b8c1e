// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Blog posts on top of a document collection.
//!
//! Every operation turns store and parsing failures into the [`Status`] the
//! caller receives: unparsable ids are `InvalidArgument`, missing posts are
//! `NotFound` and anything going wrong inside the store is `Internal` with
//! the store's message preserved.

use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use callwire_rpc::Status;
use callwire_store::{Collection, ObjectId, StoreError, from_document, to_document};

use crate::messages::Blog;

/// Stored form of a [`Blog`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BlogItem {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    author_id: String,
    title: String,
    content: String,
}

impl BlogItem {
    fn new(id: Option<ObjectId>, blog: Blog) -> Self {
        Self {
            id,
            author_id: blog.author_id,
            title: blog.title,
            content: blog.content,
        }
    }

    fn into_blog(self) -> Blog {
        Blog {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            author_id: self.author_id,
            title: self.title,
            content: self.content,
        }
    }
}

fn parse_id(id: &str) -> Result<ObjectId, Status> {
    ObjectId::parse_str(id).map_err(|e| Status::invalid_argument(format!("Cannot parse ID: {}", e)))
}

fn not_found(id: &ObjectId) -> Status {
    Status::not_found(format!("Cannot find blog with id {}", id))
}

fn internal(context: &str, error: StoreError) -> Status {
    Status::internal(format!("{}: {}", context, error))
}

/// CRUD over the blog collection. Clones share the collection.
#[derive(Clone)]
pub struct BlogStore {
    collection: Arc<dyn Collection>,
}

impl std::fmt::Debug for BlogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogStore")
            .field("collection", &self.collection.name())
            .finish()
    }
}

impl BlogStore {
    pub fn new(collection: Arc<dyn Collection>) -> Self {
        Self { collection }
    }

    /// Store a new post. Any id carried by `blog` is ignored.
    pub async fn create(&self, blog: Blog) -> Result<Blog, Status> {
        let document = to_document(&BlogItem::new(None, blog.clone()))
            .map_err(|e| internal("Internal error", e))?;

        let inserted = self
            .collection
            .insert_one(document)
            .await
            .map_err(|e| internal("Internal error", e))?;

        let id = inserted
            .as_str()
            .and_then(|id| ObjectId::parse_str(id).ok())
            .ok_or_else(|| {
                Status::internal(format!("Cannot convert to ObjectId: {}", inserted))
            })?;

        debug!(%id, "blog created");
        Ok(blog.with_id(id.to_hex()))
    }

    pub async fn read(&self, blog_id: &str) -> Result<Blog, Status> {
        let id = parse_id(blog_id)?;
        let item = self.find(&id).await?;
        Ok(item.into_blog())
    }

    /// Replace every field of the stored post with those of `blog`.
    pub async fn update(&self, blog: Blog) -> Result<Blog, Status> {
        let id = parse_id(&blog.id)?;
        self.find(&id).await?;

        let item = BlogItem::new(Some(id), blog);
        let document = to_document(&item).map_err(|e| internal("Cannot update blog", e))?;

        let matched = self
            .collection
            .replace_one(&id, document)
            .await
            .map_err(|e| internal("Cannot update blog", e))?;
        if matched == 0 {
            // removed between lookup and replace
            return Err(not_found(&id));
        }

        debug!(%id, "blog updated");
        Ok(item.into_blog())
    }

    /// Remove a post and return its id
    pub async fn delete(&self, blog_id: &str) -> Result<String, Status> {
        let id = parse_id(blog_id)?;

        let deleted = self
            .collection
            .delete_one(&id)
            .await
            .map_err(|e| internal("Error on deleting document", e))?;
        if deleted == 0 {
            return Err(Status::not_found(format!("Document not found {}", blog_id)));
        }

        debug!(%id, "blog deleted");
        Ok(id.to_hex())
    }

    /// Every stored post, in the collection's order.
    ///
    /// The stream ends with an `Internal` error at the first post that
    /// cannot be decoded.
    pub async fn list(
        &self,
    ) -> Result<impl Stream<Item = Result<Blog, Status>> + Send + 'static + use<>, Status> {
        let mut cursor = self
            .collection
            .find_all()
            .await
            .map_err(|e| internal("Error on reading a blog list", e))?;

        Ok(try_stream! {
            while let Some(document) = cursor.next().await {
                let document = document.map_err(|e| internal("Unknown error", e))?;
                let item: BlogItem = from_document(document)
                    .map_err(|e| internal("Error decoding blog item", e))?;
                yield item.into_blog();
            }
        })
    }

    /// Close the underlying collection
    pub async fn close(&self) -> Result<(), StoreError> {
        self.collection.close().await
    }

    async fn find(&self, id: &ObjectId) -> Result<BlogItem, Status> {
        let document = self
            .collection
            .find_one(id)
            .await
            .map_err(|e| internal("Internal error", e))?
            .ok_or_else(|| not_found(id))?;

        from_document(document).map_err(|e| internal("Error decoding blog item", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use callwire_rpc::Code;
    use callwire_store::{Cursor, Document, ID_FIELD, MemoryCollection};
    use serde_json::Value;

    /// Collection that stores documents but reports numeric insert ids
    struct NumericIds(MemoryCollection);

    #[async_trait]
    impl Collection for NumericIds {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn insert_one(&self, document: Document) -> Result<Value, StoreError> {
            self.0.insert_one(document).await?;
            Ok(Value::from(17))
        }

        async fn find_one(&self, id: &ObjectId) -> Result<Option<Document>, StoreError> {
            self.0.find_one(id).await
        }

        async fn replace_one(&self, id: &ObjectId, document: Document) -> Result<u64, StoreError> {
            self.0.replace_one(id, document).await
        }

        async fn delete_one(&self, id: &ObjectId) -> Result<u64, StoreError> {
            self.0.delete_one(id).await
        }

        async fn find_all(&self) -> Result<Cursor, StoreError> {
            self.0.find_all().await
        }

        async fn close(&self) -> Result<(), StoreError> {
            self.0.close().await
        }
    }

    fn store() -> (BlogStore, Arc<MemoryCollection>) {
        let collection = Arc::new(MemoryCollection::new("blog"));
        (BlogStore::new(collection.clone()), collection)
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_create_then_read() {
        let (store, _) = store();
        let created = store.create(Blog::new("A", "T", "C")).await.unwrap();
        assert_eq!(created.id.len(), 24);

        let read = store.read(&created.id).await.unwrap();
        assert_eq!(read, created);
        assert_eq!(read, Blog::new("A", "T", "C").with_id(created.id.clone()));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_create_with_unexpected_id_shape() {
        let store = BlogStore::new(Arc::new(NumericIds(MemoryCollection::new("blog"))));

        let err = store.create(Blog::new("A", "T", "C")).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().unwrap().contains("Cannot convert to ObjectId: 17"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_create_ignores_supplied_id() {
        let (store, _) = store();
        let supplied = ObjectId::new().to_hex();
        let created = store
            .create(Blog::new("A", "T", "C").with_id(supplied.clone()))
            .await
            .unwrap();
        assert_ne!(created.id, supplied);
        assert_eq!(
            store.read(&supplied).await.unwrap_err().code(),
            Code::NotFound
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_update_replaces_all_fields() {
        let (store, _) = store();
        let created = store.create(Blog::new("A", "T", "C")).await.unwrap();

        // empty fields in the update become empty in the stored post
        let updated = store
            .update(Blog::new("A2", "", "C2").with_id(created.id.clone()))
            .await
            .unwrap();
        assert_eq!(updated, Blog::new("A2", "", "C2").with_id(created.id.clone()));
        assert_eq!(store.read(&created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_missing_and_malformed_ids() {
        let (store, _) = store();
        let missing = ObjectId::new().to_hex();

        assert_eq!(store.read(&missing).await.unwrap_err().code(), Code::NotFound);
        assert_eq!(
            store
                .update(Blog::new("A", "T", "C").with_id(missing.clone()))
                .await
                .unwrap_err()
                .code(),
            Code::NotFound
        );
        assert_eq!(store.delete(&missing).await.unwrap_err().code(), Code::NotFound);

        for bad in ["", "not-an-id", "0123456789abcdef0123456", "zz23456789abcdef01234567"] {
            assert_eq!(store.read(bad).await.unwrap_err().code(), Code::InvalidArgument);
            assert_eq!(store.delete(bad).await.unwrap_err().code(), Code::InvalidArgument);
            assert_eq!(
                store
                    .update(Blog::new("A", "T", "C").with_id(bad))
                    .await
                    .unwrap_err()
                    .code(),
                Code::InvalidArgument
            );
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_delete_twice() {
        let (store, _) = store();
        let created = store.create(Blog::new("A", "T", "C")).await.unwrap();

        assert_eq!(store.delete(&created.id).await.unwrap(), created.id);
        assert_eq!(
            store.delete(&created.id).await.unwrap_err().code(),
            Code::NotFound
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_list_stops_at_undecodable_item() {
        let (store, collection) = store();

        let mut good = Document::new();
        good.insert(
            ID_FIELD.to_string(),
            Value::from(ObjectId::from_bytes([0; 12]).to_hex()),
        );
        good.insert("author_id".to_string(), Value::from("A"));
        good.insert("title".to_string(), Value::from("T"));
        good.insert("content".to_string(), Value::from("C"));
        collection.insert_one(good).await.unwrap();

        let mut bad = Document::new();
        bad.insert(
            ID_FIELD.to_string(),
            Value::from(ObjectId::from_bytes([0x10; 12]).to_hex()),
        );
        bad.insert("title".to_string(), Value::from(42));
        collection.insert_one(bad).await.unwrap();

        let mut after = Document::new();
        after.insert(
            ID_FIELD.to_string(),
            Value::from(ObjectId::from_bytes([0xff; 12]).to_hex()),
        );
        after.insert("author_id".to_string(), Value::from("B"));
        after.insert("title".to_string(), Value::from("T"));
        after.insert("content".to_string(), Value::from("C"));
        collection.insert_one(after).await.unwrap();

        let results: Vec<Result<Blog, Status>> = store.list().await.unwrap().collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().author_id, "A");
        assert_eq!(results[1].as_ref().unwrap_err().code(), Code::Internal);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_closed_store_is_internal() {
        let (store, _) = store();
        let created = store.create(Blog::new("A", "T", "C")).await.unwrap();
        store.close().await.unwrap();

        let err = store.read(&created.id).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().unwrap().contains("collection is closed"));

        assert_eq!(
            store.create(Blog::new("A", "T", "C")).await.unwrap_err().code(),
            Code::Internal
        );
        assert!(store.list().await.is_err());
    }
}
