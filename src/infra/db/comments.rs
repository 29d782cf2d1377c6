use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        pagination::CommentCursor,
        repos::{CommentsRepo, CreateCommentParams, RepoError, UpdateCommentParams},
    },
    domain::entities::CommentRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str =
    "comment_id, tweet_id, user_id, text, image_name, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    comment_id: Uuid,
    tweet_id: Uuid,
    user_id: Uuid,
    text: String,
    image_name: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.comment_id,
            tweet_id: row.tweet_id,
            author_id: row.user_id,
            text: row.text,
            image_name: row.image_name.filter(|name| !name.is_empty()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(&self, params: CreateCommentParams) -> Result<Uuid, RepoError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO comments (tweet_id, user_id, text, image_name)
            VALUES ($1, $2, $3, $4)
            RETURNING comment_id
            "#,
        )
        .bind(params.tweet_id)
        .bind(params.author_id)
        .bind(params.text)
        .bind(params.image_name)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(COMMENT_COLUMNS);
        qb.push(" FROM comments WHERE comment_id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<CommentRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CommentRecord::from))
    }

    async fn list_for_tweet(
        &self,
        tweet_id: Uuid,
        after: CommentCursor,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let limit = i64::from(limit);
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(COMMENT_COLUMNS);
        qb.push(" FROM comments WHERE tweet_id = ");
        qb.push_bind(tweet_id);
        qb.push(" AND (created_at, comment_id) > (");
        qb.push_bind(after.created_at());
        qb.push(", ");
        qb.push_bind(after.id());
        qb.push(")");
        qb.push(" ORDER BY created_at ASC, comment_id ASC");
        qb.push(" LIMIT ");
        qb.push_bind(limit);

        let rows = qb
            .build_query_as::<CommentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE comments SET text = ");
        qb.push_bind(params.text);
        qb.push(", image_name = ");
        qb.push_bind(params.image_name);
        qb.push(", updated_at = now() WHERE comment_id = ");
        qb.push_bind(params.id);
        qb.push(" RETURNING ");
        qb.push(COMMENT_COLUMNS);

        let row = qb
            .build_query_as::<CommentRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(CommentRecord::from(row))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE comment_id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
