use crate::server::{
    Result, ServerError, ServerRouter,
    extract::{Json, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use poststore_common::model::{
    Id,
    member::MemberMarker,
    post::{DailyPostCount, DailyPostCountRequest, Post},
};
use poststore_db::store::PostStore;
use serde::Deserialize;
use std::sync::Arc;
use time::Date;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_member_posts)
        .typed_get(get_daily_post_counts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/members/{id}/posts", rejection(ServerError))]
struct GetMemberPostsPath {
    id: Id<MemberMarker>,
}

async fn get_member_posts(
    GetMemberPostsPath { id }: GetMemberPostsPath,
    State(store): State<Arc<PostStore>>,
) -> Result<Json<Vec<Post>>> {
    let posts = store.fetch_member_posts(id).await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/members/{id}/daily-post-counts", rejection(ServerError))]
struct GetDailyPostCountsPath {
    id: Id<MemberMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct DateRange {
    first_date: Date,
    last_date: Date,
}

async fn get_daily_post_counts(
    GetDailyPostCountsPath { id }: GetDailyPostCountsPath,
    State(store): State<Arc<PostStore>>,
    Query(range): Query<DateRange>,
) -> Result<Json<Vec<DailyPostCount>>> {
    let request = DailyPostCountRequest {
        member_id: id,
        first_date: range.first_date,
        last_date: range.last_date,
    };
    if !request.has_valid_range() {
        return Err(ServerError::InvalidDateRange {
            first_date: request.first_date,
            last_date: request.last_date,
        });
    }

    let counts = store.group_by_created_date(&request).await?;

    Ok(Json(counts))
}
