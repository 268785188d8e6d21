use ::chrono::{DateTime, Utc};

use crate::model::{Audience, GradeLevel, Post, PostDraft, PostType};

#[derive(::sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    post_type: PostType,
    grade_level: Audience,
    author_id: i64,
    author_name: String,
    created_at: i64,
    updated_at: i64,
    is_published: bool,
    expires_at: Option<i64>,
}

impl PostRow {
    fn into_post(self) -> ::sqlx::Result<Post> {
        Ok(Post {
            id: self.id,
            title: self.title,
            content: self.content,
            post_type: self.post_type,
            grade_level: self.grade_level,
            author_id: self.author_id,
            author_name: self.author_name,
            created_at: crate::sqlite::from_unix_milliseconds(self.created_at)?,
            updated_at: crate::sqlite::from_unix_milliseconds(self.updated_at)?,
            is_published: self.is_published,
            expires_at: self
                .expires_at
                .map(crate::sqlite::from_unix_milliseconds)
                .transpose()?,
        })
    }
}

const SELECT_POSTS: &str = "
    SELECT
        posts.id,
        posts.title,
        posts.content,
        posts.post_type,
        posts.grade_level,
        posts.author_id,
        users.first_name || ' ' || users.last_name AS author_name,
        posts.created_at,
        posts.updated_at,
        posts.is_published,
        posts.expires_at
    FROM
        posts
    JOIN
        users
    ON
        users.id = posts.author_id
";

/// Narrows `list_posts`. `grade_scope` keeps posts addressed to that grade
/// plus posts addressed to everybody; `None` keeps every grade.
#[derive(Clone, Debug, Default)]
pub(crate) struct PostFilter {
    pub post_type: Option<PostType>,
    pub grade_scope: Option<GradeLevel>,
    pub published_only: bool,
    pub active_at: Option<DateTime<Utc>>,
}

pub(crate) async fn insert_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    author_id: i64,
    draft: &PostDraft,
    now: &DateTime<Utc>,
) -> ::sqlx::Result<Post> {
    let query = "
        INSERT INTO posts (
            title,
            content,
            post_type,
            grade_level,
            author_id,
            created_at,
            updated_at,
            is_published,
            expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8);
    ";

    let result = ::sqlx::query(query)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.post_type)
        .bind(draft.grade_level)
        .bind(author_id)
        .bind(crate::sqlite::to_unix_milliseconds(now))
        .bind(draft.is_published)
        .bind(draft.expires_at.as_ref().map(crate::sqlite::to_unix_milliseconds))
        .execute(&mut **transaction)
        .await?;

    load_post(transaction, result.last_insert_rowid())
        .await?
        .ok_or(::sqlx::Error::RowNotFound)
}

pub(crate) async fn load_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    post_id: i64,
) -> ::sqlx::Result<Option<Post>> {
    let query = format!("{} WHERE posts.id = $1;", SELECT_POSTS);

    ::sqlx::query_as::<_, PostRow>(&query)
        .bind(post_id)
        .fetch_optional(&mut **transaction)
        .await?
        .map(PostRow::into_post)
        .transpose()
}

/// Overwrites the mutable fields of a post. The post type and author never
/// change.
pub(crate) async fn update_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    post_id: i64,
    draft: &PostDraft,
    now: &DateTime<Utc>,
) -> ::sqlx::Result<bool> {
    let query = "
        UPDATE
            posts
        SET
            title = $2,
            content = $3,
            grade_level = $4,
            is_published = $5,
            expires_at = $6,
            updated_at = $7
        WHERE
            id = $1;
    ";

    let result = ::sqlx::query(query)
        .bind(post_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.grade_level)
        .bind(draft.is_published)
        .bind(draft.expires_at.as_ref().map(crate::sqlite::to_unix_milliseconds))
        .bind(crate::sqlite::to_unix_milliseconds(now))
        .execute(&mut **transaction)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    post_id: i64,
) -> ::sqlx::Result<bool> {
    let result = ::sqlx::query("DELETE FROM posts WHERE id = $1;")
        .bind(post_id)
        .execute(&mut **transaction)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_posts(
    transaction: &mut crate::sqlite::Transaction<'_>,
    filter: &PostFilter,
) -> ::sqlx::Result<::std::vec::Vec<Post>> {
    let query = format!(
        "{}
        WHERE
            ($1 IS NULL OR posts.post_type = $1)
        AND
            ($2 IS NULL OR posts.grade_level = $2 OR posts.grade_level = 'all')
        AND
            ($3 = 0 OR posts.is_published = 1)
        AND
            ($4 IS NULL OR posts.expires_at IS NULL OR posts.expires_at > $4)
        ORDER BY
            posts.created_at DESC,
            posts.id DESC;
        ",
        SELECT_POSTS
    );

    let rows = ::sqlx::query_as::<_, PostRow>(&query)
        .bind(filter.post_type)
        .bind(filter.grade_scope)
        .bind(filter.published_only)
        .bind(filter.active_at.as_ref().map(crate::sqlite::to_unix_milliseconds))
        .fetch_all(&mut **transaction)
        .await?;

    rows.into_iter().map(PostRow::into_post).collect()
}
