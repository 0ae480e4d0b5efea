use crate::server::{Result, ServerError, ServerRouter, extract::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use poststore_common::model::{
    Id,
    post::{CreatePost, Post, PostMarker},
};
use poststore_db::store::PostStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_post(bulk_create_posts)
        .typed_get(get_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct CreatePostPath();

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(store): State<Arc<PostStore>>,
    Json(post): Json<CreatePost>,
) -> Result<Json<Post>> {
    let post = store.insert_one(&post.into_post()).await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/bulk", rejection(ServerError))]
struct BulkCreatePostsPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct BulkInsertSummary {
    inserted: usize,
}

async fn bulk_create_posts(
    BulkCreatePostsPath(): BulkCreatePostsPath,
    State(store): State<Arc<PostStore>>,
    Json(posts): Json<Vec<CreatePost>>,
) -> Result<Json<BulkInsertSummary>> {
    let posts: Vec<Post> = posts.into_iter().map(CreatePost::into_post).collect();
    store.bulk_insert(&posts).await?;

    info!(inserted = posts.len(), "Bulk created posts");

    Ok(Json(BulkInsertSummary {
        inserted: posts.len(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct GetPostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    GetPostPath { id }: GetPostPath,
    State(store): State<Arc<PostStore>>,
) -> Result<Json<Post>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}
