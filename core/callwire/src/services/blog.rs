// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use futures::{Stream, StreamExt};

use callwire_rpc::{CallOptions, Channel, Context, RpcError, Server, Status};

use crate::blog_store::BlogStore;
use crate::messages::{
    CreateBlogRequest, CreateBlogResponse, DeleteBlogRequest, DeleteBlogResponse, ListBlogRequest,
    ListBlogResponse, ReadBlogRequest, ReadBlogResponse, UpdateBlogRequest, UpdateBlogResponse,
};

pub const SERVICE_NAME: &str = "blog.BlogService";

#[derive(Debug, Clone)]
pub struct BlogService {
    store: Arc<BlogStore>,
}

impl BlogService {
    pub fn new(store: Arc<BlogStore>) -> Self {
        Self { store }
    }

    pub fn register(&self, server: &Server) -> Result<(), RpcError> {
        let store = self.store.clone();
        server.register_unary_unary(
            SERVICE_NAME,
            "CreateBlog",
            move |request: CreateBlogRequest, _ctx: Context| {
                let store = store.clone();
                async move {
                    let blog = store.create(request.blog).await?;
                    Ok::<_, Status>(CreateBlogResponse { blog })
                }
            },
        )?;

        let store = self.store.clone();
        server.register_unary_unary(
            SERVICE_NAME,
            "ReadBlog",
            move |request: ReadBlogRequest, _ctx: Context| {
                let store = store.clone();
                async move {
                    let blog = store.read(&request.blog_id).await?;
                    Ok::<_, Status>(ReadBlogResponse { blog })
                }
            },
        )?;

        let store = self.store.clone();
        server.register_unary_unary(
            SERVICE_NAME,
            "UpdateBlog",
            move |request: UpdateBlogRequest, _ctx: Context| {
                let store = store.clone();
                async move {
                    let blog = store.update(request.blog).await?;
                    Ok::<_, Status>(UpdateBlogResponse { blog })
                }
            },
        )?;

        let store = self.store.clone();
        server.register_unary_unary(
            SERVICE_NAME,
            "DeleteBlog",
            move |request: DeleteBlogRequest, _ctx: Context| {
                let store = store.clone();
                async move {
                    let blog_id = store.delete(&request.blog_id).await?;
                    Ok::<_, Status>(DeleteBlogResponse { blog_id })
                }
            },
        )?;

        let store = self.store.clone();
        server.register_unary_stream(
            SERVICE_NAME,
            "ListBlog",
            move |_request: ListBlogRequest, _ctx: Context| {
                let store = store.clone();
                async move {
                    let blogs = store.list().await?;
                    Ok::<_, Status>(blogs.map(|blog| blog.map(|blog| ListBlogResponse { blog })))
                }
            },
        )?;

        Ok(())
    }
}

/// Typed client of the blog service
#[derive(Debug, Clone)]
pub struct BlogClient {
    channel: Channel,
}

impl BlogClient {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub async fn create_blog(
        &self,
        request: CreateBlogRequest,
        options: CallOptions,
    ) -> Result<CreateBlogResponse, Status> {
        self.channel
            .unary(SERVICE_NAME, "CreateBlog", request, options)
            .await
    }

    pub async fn read_blog(
        &self,
        request: ReadBlogRequest,
        options: CallOptions,
    ) -> Result<ReadBlogResponse, Status> {
        self.channel
            .unary(SERVICE_NAME, "ReadBlog", request, options)
            .await
    }

    pub async fn update_blog(
        &self,
        request: UpdateBlogRequest,
        options: CallOptions,
    ) -> Result<UpdateBlogResponse, Status> {
        self.channel
            .unary(SERVICE_NAME, "UpdateBlog", request, options)
            .await
    }

    pub async fn delete_blog(
        &self,
        request: DeleteBlogRequest,
        options: CallOptions,
    ) -> Result<DeleteBlogResponse, Status> {
        self.channel
            .unary(SERVICE_NAME, "DeleteBlog", request, options)
            .await
    }

    pub fn list_blog(
        &self,
        request: ListBlogRequest,
        options: CallOptions,
    ) -> impl Stream<Item = Result<ListBlogResponse, Status>> + Send + 'static {
        self.channel
            .unary_stream(SERVICE_NAME, "ListBlog", request, options)
    }
}
