use poststore_common::model::{
    ModelValidationError,
    post::{DailyPostCount, InvalidPostCountError, Post},
};
use sqlx::{FromRow, Sqlite, query::Query, sqlite::SqliteArguments};
use time::{Date, PrimitiveDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub(crate) struct PostRecord {
    pub id: i64,
    pub member_id: i64,
    pub contents: String,
    pub created_date: Date,
    pub created_at: PrimitiveDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub(crate) struct DailyPostCountRecord {
    pub member_id: i64,
    pub created_date: Date,
    pub count: i64,
}

/// The values bound to `?1..?4` of a post insert, in column order
/// `memberId, contents, createdDate, createdAt`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) struct PostParams<'a> {
    pub member_id: i64,
    pub contents: &'a str,
    pub created_date: Date,
    pub created_at: PrimitiveDateTime,
}

impl<'a> PostParams<'a> {
    pub fn bind(
        self,
        query: Query<'a, Sqlite, SqliteArguments<'a>>,
    ) -> Query<'a, Sqlite, SqliteArguments<'a>> {
        query
            .bind(self.member_id)
            .bind(self.contents)
            .bind(self.created_date)
            .bind(self.created_at)
    }
}

impl<'a> From<&'a Post> for PostParams<'a> {
    fn from(value: &'a Post) -> Self {
        Self {
            member_id: value.member_id.get(),
            contents: &value.contents,
            created_date: value.created_date,
            created_at: value.created_at,
        }
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: Some(value.id.into()),
            member_id: value.member_id.into(),
            contents: value.contents,
            created_date: value.created_date,
            created_at: value.created_at,
        }
    }
}

impl TryFrom<DailyPostCountRecord> for DailyPostCount {
    type Error = ModelValidationError;

    fn try_from(value: DailyPostCountRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            member_id: value.member_id.into(),
            created_date: value.created_date,
            count: u64::try_from(value.count).map_err(|_| InvalidPostCountError(value.count))?,
        })
    }
}
