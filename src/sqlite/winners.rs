use ::chrono::{DateTime, Utc};

use crate::model::{GradeLevel, MonthlyWinner, VoteMonth};

#[derive(::sqlx::FromRow)]
struct WinnerRow {
    id: i64,
    post_id: i64,
    post_title: String,
    post_author: String,
    #[sqlx(try_from = "String")]
    month: VoteMonth,
    grade_level: GradeLevel,
    #[sqlx(try_from = "i64")]
    vote_count: u64,
    created_at: i64,
}

impl WinnerRow {
    fn into_winner(self) -> ::sqlx::Result<MonthlyWinner> {
        Ok(MonthlyWinner {
            id: self.id,
            post_id: self.post_id,
            post_title: self.post_title,
            post_author: self.post_author,
            month: self.month,
            grade_level: self.grade_level,
            vote_count: self.vote_count,
            created_at: crate::sqlite::from_unix_milliseconds(self.created_at)?,
        })
    }
}

const SELECT_WINNERS: &str = "
    SELECT
        monthly_winners.id,
        monthly_winners.post_id,
        posts.title AS post_title,
        users.first_name || ' ' || users.last_name AS post_author,
        monthly_winners.month,
        monthly_winners.grade_level,
        monthly_winners.vote_count,
        monthly_winners.created_at
    FROM
        monthly_winners
    JOIN
        posts
    ON
        posts.id = monthly_winners.post_id
    JOIN
        users
    ON
        users.id = posts.author_id
";

/// Records the winner for (`month`, `grade_level`) unless one already
/// exists. Returns `None` when the slot was taken.
pub(crate) async fn insert_winner_if_absent(
    transaction: &mut crate::sqlite::Transaction<'_>,
    post_id: i64,
    month: &VoteMonth,
    grade_level: GradeLevel,
    vote_count: u64,
    now: &DateTime<Utc>,
) -> ::sqlx::Result<Option<MonthlyWinner>> {
    let query = "
        INSERT INTO monthly_winners (
            post_id,
            month,
            grade_level,
            vote_count,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (month, grade_level) DO NOTHING;
    ";

    let vote_count = i64::try_from(vote_count)
        .map_err(|err| ::sqlx::Error::Protocol(err.to_string()))?;

    let result = ::sqlx::query(query)
        .bind(post_id)
        .bind(month.to_string())
        .bind(grade_level)
        .bind(vote_count)
        .bind(crate::sqlite::to_unix_milliseconds(now))
        .execute(&mut **transaction)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let query = format!("{} WHERE monthly_winners.id = $1;", SELECT_WINNERS);

    ::sqlx::query_as::<_, WinnerRow>(&query)
        .bind(result.last_insert_rowid())
        .fetch_one(&mut **transaction)
        .await?
        .into_winner()
        .map(Some)
}

pub(crate) async fn load_winners_for_month(
    transaction: &mut crate::sqlite::Transaction<'_>,
    month: &VoteMonth,
    grade_level: Option<GradeLevel>,
) -> ::sqlx::Result<::std::vec::Vec<MonthlyWinner>> {
    let query = format!(
        "{}
        WHERE
            monthly_winners.month = $1
        AND
            ($2 IS NULL OR monthly_winners.grade_level = $2)
        ORDER BY
            monthly_winners.id ASC;
        ",
        SELECT_WINNERS
    );

    let rows = ::sqlx::query_as::<_, WinnerRow>(&query)
        .bind(month.to_string())
        .bind(grade_level)
        .fetch_all(&mut **transaction)
        .await?;

    rows.into_iter().map(WinnerRow::into_winner).collect()
}

/// Newest months first.
pub(crate) async fn load_recent_winners(
    transaction: &mut crate::sqlite::Transaction<'_>,
    limit: u32,
    grade_level: Option<GradeLevel>,
) -> ::sqlx::Result<::std::vec::Vec<MonthlyWinner>> {
    let query = format!(
        "{}
        WHERE
            ($1 IS NULL OR monthly_winners.grade_level = $1)
        ORDER BY
            monthly_winners.month DESC,
            monthly_winners.id ASC
        LIMIT $2;
        ",
        SELECT_WINNERS
    );

    let rows = ::sqlx::query_as::<_, WinnerRow>(&query)
        .bind(grade_level)
        .bind(i64::from(limit))
        .fetch_all(&mut **transaction)
        .await?;

    rows.into_iter().map(WinnerRow::into_winner).collect()
}
