use crate::record::{DailyPostCountRecord, PostParams, PostRecord};
use poststore_common::model::{
    Id, ModelValidationError,
    member::MemberMarker,
    post::{DailyPostCount, DailyPostCountRequest, Post, PostMarker},
};
use sqlx::{Row, SqlitePool, migrate::MigrateError, query, query_as};
use thiserror::Error;
use tracing::{debug, warn};

const INSERT_POST_SQL: &str = "
    INSERT INTO Post (memberId, contents, createdDate, createdAt)
    VALUES (?1, ?2, ?3, ?4)
";

const INSERT_POST_RETURNING_ID_SQL: &str = "
    INSERT INTO Post (memberId, contents, createdDate, createdAt)
    VALUES (?1, ?2, ?3, ?4)
    RETURNING id
";

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Posts cannot be updated, but post {0} already has an id")]
    UnsupportedOperation(Id<PostMarker>),
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Data access for the append-only `Post` table.
#[derive(Debug)]
pub struct PostStore {
    pool: SqlitePool,
}

impl PostStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a post that has not been saved yet and returns it with the id
    /// the database generated for it.
    ///
    /// Fails with [`DbError::UnsupportedOperation`] without touching the
    /// database if `post` already has an id.
    pub async fn insert_one(&self, post: &Post) -> Result<Post> {
        if let Some(id) = post.id {
            warn!(post_id = %id, "Refusing to update an existing post");
            return Err(DbError::UnsupportedOperation(id));
        }

        let row = PostParams::from(post)
            .bind(query(INSERT_POST_RETURNING_ID_SQL))
            .fetch_one(&self.pool)
            .await?;
        let id: i64 = row.try_get("id")?;
        let id = Id::<PostMarker>::new(id);

        debug!(post_id = %id, member_id = %post.member_id, "Inserted post");

        Ok(Post {
            id: Some(id),
            ..post.clone()
        })
    }

    /// Inserts all `posts` in one transaction. Either every post is written or,
    /// if any insert fails, none is.
    ///
    /// Generated ids are not returned. Every post is checked for an existing
    /// id before anything is written.
    pub async fn bulk_insert(&self, posts: &[Post]) -> Result<()> {
        if let Some(id) = posts.iter().find_map(|post| post.id) {
            warn!(post_id = %id, "Refusing to update an existing post in batch");
            return Err(DbError::UnsupportedOperation(id));
        }

        if posts.is_empty() {
            return Ok(());
        }

        let mut transaction = self.pool.begin().await?;
        for post in posts {
            PostParams::from(post)
                .bind(query(INSERT_POST_SQL))
                .execute(&mut *transaction)
                .await?;
        }
        transaction.commit().await?;

        debug!(count = posts.len(), "Inserted posts in batch");

        Ok(())
    }

    /// Counts the posts of one member per creation date, for every date in the
    /// requested range that has at least one post. Rows are ordered by date.
    ///
    /// An inverted range matches nothing and yields an empty list.
    pub async fn group_by_created_date(
        &self,
        request: &DailyPostCountRequest,
    ) -> Result<Vec<DailyPostCount>> {
        let records = query_as::<_, DailyPostCountRecord>(
            "
            SELECT
                memberId,
                createdDate,
                count(id) AS count
            FROM
                Post
            WHERE
                memberId = ?1
                AND createdDate BETWEEN ?2 AND ?3
            GROUP BY
                memberId,
                createdDate
            ORDER BY
                createdDate
            ",
        )
        .bind(request.member_id.get())
        .bind(request.first_date)
        .bind(request.last_date)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            member_id = %request.member_id,
            first_date = %request.first_date,
            last_date = %request.last_date,
            days = records.len(),
            "Counted daily posts"
        );

        let counts = records
            .into_iter()
            .map(DailyPostCount::try_from)
            .collect::<std::result::Result<_, _>>()?;
        Ok(counts)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT
                id,
                memberId,
                contents,
                createdDate,
                createdAt
            FROM
                Post
            WHERE
                id = ?1
            ",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::from))
    }

    /// All posts of a member, oldest first.
    pub async fn fetch_member_posts(&self, member_id: Id<MemberMarker>) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(
            "
            SELECT
                id,
                memberId,
                contents,
                createdDate,
                createdAt
            FROM
                Post
            WHERE
                memberId = ?1
            ORDER BY
                createdAt,
                id
            ",
        )
        .bind(member_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        MIGRATOR,
        store::{DbError, PostStore},
    };
    use poststore_common::model::{
        Id,
        post::{DailyPostCount, DailyPostCountRequest, Post},
    };
    use sqlx::{query_scalar, sqlite::SqlitePoolOptions};
    use time::{
        Date, PrimitiveDateTime, Time,
        macros::{date, datetime, time},
    };

    async fn memory_store() -> PostStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        MIGRATOR.run(&pool).await.unwrap();

        PostStore::new(pool)
    }

    async fn row_count(store: &PostStore) -> i64 {
        query_scalar("SELECT count(*) FROM Post")
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    fn post_on(member_id: i64, date: Date, time: Time) -> Post {
        Post::with_timestamp(
            Id::new(member_id),
            format!("post by {member_id} on {date}"),
            PrimitiveDateTime::new(date, time),
        )
    }

    fn request(member_id: i64, first_date: Date, last_date: Date) -> DailyPostCountRequest {
        DailyPostCountRequest {
            member_id: Id::new(member_id),
            first_date,
            last_date,
        }
    }

    #[tokio::test]
    async fn insert_one_assigns_fresh_ids() {
        let store = memory_store().await;
        let first = Post::with_timestamp(Id::new(1), "first", datetime!(2024-01-01 09:00:00.25));
        let second = Post::with_timestamp(Id::new(1), "second", datetime!(2024-01-01 09:00:01));

        let saved_first = store.insert_one(&first).await.unwrap();
        let saved_second = store.insert_one(&second).await.unwrap();

        let first_id = saved_first.id.unwrap();
        let second_id = saved_second.id.unwrap();
        assert_ne!(first_id, second_id);

        assert_eq!(
            Post {
                id: None,
                ..saved_first.clone()
            },
            first
        );
        assert_eq!(
            Post {
                id: None,
                ..saved_second.clone()
            },
            second
        );

        assert_eq!(store.fetch_post(first_id).await.unwrap(), Some(saved_first));
        assert_eq!(store.fetch_post(second_id).await.unwrap(), Some(saved_second));
    }

    #[tokio::test]
    async fn insert_one_rejects_persisted_post() {
        let store = memory_store().await;
        let mut post = Post::with_timestamp(Id::new(1), "edited", datetime!(2024-01-01 09:00));
        post.id = Some(Id::new(5));

        let error = store.insert_one(&post).await.unwrap_err();

        assert!(matches!(error, DbError::UnsupportedOperation(id) if id == Id::new(5)));
        assert_eq!(row_count(&store).await, 0);
    }

    #[tokio::test]
    async fn insert_one_propagates_database_errors() {
        let store = memory_store().await;
        let post = Post::with_timestamp(Id::new(1), "x".repeat(101), datetime!(2024-01-01 09:00));

        let error = store.insert_one(&post).await.unwrap_err();

        assert!(matches!(error, DbError::Sqlx(_)));
        assert_eq!(row_count(&store).await, 0);
    }

    #[tokio::test]
    async fn fetch_missing_post() {
        let store = memory_store().await;

        assert_eq!(store.fetch_post(Id::new(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn bulk_insert_writes_every_post() {
        let store = memory_store().await;
        let posts = vec![
            post_on(2, date!(2024 - 01 - 01), time!(08:00)),
            post_on(2, date!(2024 - 01 - 01), time!(09:00)),
            post_on(2, date!(2024 - 01 - 02), time!(10:00)),
        ];

        store.bulk_insert(&posts).await.unwrap();

        let stored = store.fetch_member_posts(Id::new(2)).await.unwrap();
        assert_eq!(stored.len(), posts.len());
        for (stored, expected) in stored.into_iter().zip(&posts) {
            assert!(stored.is_persisted());
            assert_eq!(&Post { id: None, ..stored }, expected);
        }
    }

    #[tokio::test]
    async fn bulk_insert_of_nothing_is_a_no_op() {
        let store = memory_store().await;

        store.bulk_insert(&[]).await.unwrap();

        assert_eq!(row_count(&store).await, 0);
    }

    #[tokio::test]
    async fn bulk_insert_rejects_persisted_posts() {
        let store = memory_store().await;
        let mut persisted = post_on(3, date!(2024 - 01 - 01), time!(12:00));
        persisted.id = Some(Id::new(40));
        let posts = vec![post_on(3, date!(2024 - 01 - 01), time!(11:00)), persisted];

        let error = store.bulk_insert(&posts).await.unwrap_err();

        assert!(matches!(error, DbError::UnsupportedOperation(id) if id == Id::new(40)));
        assert_eq!(row_count(&store).await, 0);
    }

    #[tokio::test]
    async fn bulk_insert_is_all_or_nothing() {
        let store = memory_store().await;
        let posts = vec![
            post_on(4, date!(2024 - 01 - 01), time!(08:00)),
            Post::with_timestamp(Id::new(4), "x".repeat(101), datetime!(2024-01-01 09:00)),
            post_on(4, date!(2024 - 01 - 01), time!(10:00)),
        ];

        let error = store.bulk_insert(&posts).await.unwrap_err();

        assert!(matches!(error, DbError::Sqlx(_)));
        assert_eq!(row_count(&store).await, 0);

        // The pool is still usable after the rollback.
        store.bulk_insert(&posts[..1]).await.unwrap();
        assert_eq!(row_count(&store).await, 1);
    }

    #[tokio::test]
    async fn daily_counts_per_member() {
        let store = memory_store().await;
        store
            .bulk_insert(&[
                post_on(7, date!(2023 - 12 - 31), time!(23:59)),
                post_on(7, date!(2024 - 01 - 01), time!(00:00)),
                post_on(7, date!(2024 - 01 - 01), time!(18:30)),
                post_on(7, date!(2024 - 01 - 03), time!(12:00)),
                post_on(7, date!(2024 - 01 - 04), time!(00:00)),
                post_on(8, date!(2024 - 01 - 01), time!(10:00)),
                post_on(8, date!(2024 - 01 - 02), time!(10:00)),
            ])
            .await
            .unwrap();

        let counts = store
            .group_by_created_date(&request(7, date!(2024 - 01 - 01), date!(2024 - 01 - 03)))
            .await
            .unwrap();

        assert_eq!(
            counts,
            vec![
                DailyPostCount {
                    member_id: Id::new(7),
                    created_date: date!(2024 - 01 - 01),
                    count: 2,
                },
                DailyPostCount {
                    member_id: Id::new(7),
                    created_date: date!(2024 - 01 - 03),
                    count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn daily_counts_include_both_bounds() {
        let store = memory_store().await;
        store
            .bulk_insert(&[
                post_on(1, date!(2024 - 02 - 28), time!(00:00)),
                post_on(1, date!(2024 - 02 - 29), time!(12:00)),
                post_on(1, date!(2024 - 03 - 01), time!(23:59:59.999)),
            ])
            .await
            .unwrap();

        let counts = store
            .group_by_created_date(&request(1, date!(2024 - 02 - 28), date!(2024 - 03 - 01)))
            .await
            .unwrap();
        let dates: Vec<Date> = counts.iter().map(|count| count.created_date).collect();
        assert_eq!(
            dates,
            vec![
                date!(2024 - 02 - 28),
                date!(2024 - 02 - 29),
                date!(2024 - 03 - 01)
            ]
        );
        assert!(counts.iter().all(|count| count.count == 1));

        let single_day = store
            .group_by_created_date(&request(1, date!(2024 - 02 - 29), date!(2024 - 02 - 29)))
            .await
            .unwrap();
        assert_eq!(single_day.len(), 1);
        assert_eq!(single_day[0].created_date, date!(2024 - 02 - 29));
    }

    #[tokio::test]
    async fn daily_counts_are_sorted_by_date() {
        let store = memory_store().await;
        store
            .bulk_insert(&[
                post_on(5, date!(2024 - 05 - 03), time!(08:00)),
                post_on(5, date!(2024 - 05 - 01), time!(08:00)),
                post_on(5, date!(2024 - 05 - 02), time!(08:00)),
                post_on(5, date!(2024 - 05 - 01), time!(09:00)),
            ])
            .await
            .unwrap();

        let counts = store
            .group_by_created_date(&request(5, date!(2024 - 05 - 01), date!(2024 - 05 - 31)))
            .await
            .unwrap();

        let summary: Vec<(Date, u64)> = counts
            .iter()
            .map(|count| (count.created_date, count.count))
            .collect();
        assert_eq!(
            summary,
            vec![
                (date!(2024 - 05 - 01), 2),
                (date!(2024 - 05 - 02), 1),
                (date!(2024 - 05 - 03), 1),
            ]
        );
    }

    #[tokio::test]
    async fn daily_counts_without_posts_are_empty() {
        let store = memory_store().await;
        store
            .insert_one(&post_on(6, date!(2024 - 01 - 10), time!(10:00)))
            .await
            .unwrap();

        let other_range = store
            .group_by_created_date(&request(6, date!(2024 - 02 - 01), date!(2024 - 02 - 29)))
            .await
            .unwrap();
        assert!(other_range.is_empty());

        let other_member = store
            .group_by_created_date(&request(9, date!(2024 - 01 - 01), date!(2024 - 01 - 31)))
            .await
            .unwrap();
        assert!(other_member.is_empty());

        let inverted = store
            .group_by_created_date(&request(6, date!(2024 - 01 - 31), date!(2024 - 01 - 01)))
            .await
            .unwrap();
        assert!(inverted.is_empty());
    }
}
