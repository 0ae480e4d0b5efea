use crate::model::{Id, member::MemberMarker};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, PrimitiveDateTime, UtcDateTime};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A single post.
///
/// `id` stays `None` until the post has been inserted. Posts are append-only,
/// so a post that already carries an id is never written again.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Option<Id<PostMarker>>,
    pub member_id: Id<MemberMarker>,
    pub contents: String,
    pub created_date: Date,
    pub created_at: PrimitiveDateTime,
}

impl Post {
    /// Creates an unsaved post stamped with the current UTC time.
    #[must_use]
    pub fn new(member_id: Id<MemberMarker>, contents: impl Into<String>) -> Self {
        let now = UtcDateTime::now();
        Self::with_timestamp(
            member_id,
            contents,
            PrimitiveDateTime::new(now.date(), now.time()),
        )
    }

    /// Creates an unsaved post created at `created_at`. The creation date is
    /// taken from the same timestamp.
    #[must_use]
    pub fn with_timestamp(
        member_id: Id<MemberMarker>,
        contents: impl Into<String>,
        created_at: PrimitiveDateTime,
    ) -> Self {
        Self {
            id: None,
            member_id,
            contents: contents.into(),
            created_date: created_at.date(),
            created_at,
        }
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreatePost {
    pub member_id: Id<MemberMarker>,
    pub contents: String,
}

impl CreatePost {
    #[must_use]
    pub fn into_post(self) -> Post {
        Post::new(self.member_id, self.contents)
    }
}

/// Number of posts one member created on one day.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct DailyPostCount {
    pub member_id: Id<MemberMarker>,
    pub created_date: Date,
    pub count: u64,
}

/// Selects the daily post counts of one member between two dates, both
/// inclusive.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct DailyPostCountRequest {
    pub member_id: Id<MemberMarker>,
    pub first_date: Date,
    pub last_date: Date,
}

impl DailyPostCountRequest {
    #[must_use]
    pub fn has_valid_range(&self) -> bool {
        self.first_date <= self.last_date
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post count is negative: {0}")]
pub struct InvalidPostCountError(pub i64);
