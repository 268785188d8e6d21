use ::chrono::{DateTime, Utc};

use crate::model::{Audience, PostVoteCount, Vote, VoteMonth};

#[derive(::sqlx::FromRow)]
struct VoteRow {
    id: i64,
    user_id: i64,
    post_id: i64,
    #[sqlx(try_from = "String")]
    vote_month: VoteMonth,
    created_at: i64,
}

#[derive(::sqlx::FromRow)]
struct VoteCountRow {
    post_id: i64,
    title: String,
    grade_level: Audience,
    #[sqlx(try_from = "i64")]
    vote_count: u64,
}

/// Fails with a unique violation when the user already voted for the post
/// in that month.
pub(crate) async fn insert_vote(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user_id: i64,
    post_id: i64,
    month: &VoteMonth,
    now: &DateTime<Utc>,
) -> ::sqlx::Result<Vote> {
    let query = "
        INSERT INTO votes (user_id, post_id, vote_month, created_at)
        VALUES ($1, $2, $3, $4);
    ";

    let result = ::sqlx::query(query)
        .bind(user_id)
        .bind(post_id)
        .bind(month.to_string())
        .bind(crate::sqlite::to_unix_milliseconds(now))
        .execute(&mut **transaction)
        .await?;

    let row = ::sqlx::query_as::<_, VoteRow>(
        "
        SELECT id, user_id, post_id, vote_month, created_at
        FROM votes
        WHERE id = $1;
        ",
    )
    .bind(result.last_insert_rowid())
    .fetch_one(&mut **transaction)
    .await?;

    Ok(Vote {
        id: row.id,
        user_id: row.user_id,
        post_id: row.post_id,
        vote_month: row.vote_month,
        created_at: crate::sqlite::from_unix_milliseconds(row.created_at)?,
    })
}

pub(crate) async fn has_voted(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user_id: i64,
    post_id: i64,
    month: &VoteMonth,
) -> ::sqlx::Result<bool> {
    let query = "
        SELECT EXISTS (
            SELECT
                1
            FROM
                votes
            WHERE
                user_id = $1
            AND
                post_id = $2
            AND
                vote_month = $3
        );
    ";

    ::sqlx::query_scalar::<_, bool>(query)
        .bind(user_id)
        .bind(post_id)
        .bind(month.to_string())
        .fetch_one(&mut **transaction)
        .await
}

/// Votes on a post, all time or within one month.
pub(crate) async fn count_votes(
    transaction: &mut crate::sqlite::Transaction<'_>,
    post_id: i64,
    month: Option<&VoteMonth>,
) -> ::sqlx::Result<u64> {
    let query = "
        SELECT
            COUNT(*)
        FROM
            votes
        WHERE
            post_id = $1
        AND
            ($2 IS NULL OR vote_month = $2);
    ";

    let count = ::sqlx::query_scalar::<_, i64>(query)
        .bind(post_id)
        .bind(month.map(|month| month.to_string()))
        .fetch_one(&mut **transaction)
        .await?;

    crate::sqlite::count_to_u64(count)
}

/// Published articles ranked by votes received in `month`, most votes
/// first, lowest post id first among equals. Articles without votes in the
/// month are absent.
pub(crate) async fn monthly_vote_counts(
    transaction: &mut crate::sqlite::Transaction<'_>,
    month: &VoteMonth,
    grade_level: Option<Audience>,
    limit: Option<u32>,
) -> ::sqlx::Result<::std::vec::Vec<PostVoteCount>> {
    let query = "
        SELECT
            posts.id AS post_id,
            posts.title AS title,
            posts.grade_level AS grade_level,
            COUNT(votes.id) AS vote_count
        FROM
            posts
        JOIN
            votes
        ON
            votes.post_id = posts.id
        WHERE
            votes.vote_month = $1
        AND
            posts.post_type = 'article'
        AND
            posts.is_published = 1
        AND
            ($2 IS NULL OR posts.grade_level = $2)
        GROUP BY
            posts.id,
            posts.title,
            posts.grade_level
        ORDER BY
            vote_count DESC,
            posts.id ASC
        LIMIT $3;
    ";

    let rows = ::sqlx::query_as::<_, VoteCountRow>(query)
        .bind(month.to_string())
        .bind(grade_level)
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&mut **transaction)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| PostVoteCount {
            post_id: row.post_id,
            title: row.title,
            grade_level: row.grade_level,
            vote_count: row.vote_count,
        })
        .collect())
}
