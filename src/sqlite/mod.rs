use ::chrono::{DateTime, TimeZone, Utc};
use ::sqlx::Executor;

pub(crate) mod posts;
pub(crate) mod stats;
pub(crate) mod users;
pub(crate) mod votes;
pub(crate) mod winners;

pub(crate) use posts::{
    delete_post, insert_post, list_posts, load_post, update_post, PostFilter,
};
pub(crate) use stats::load_stats;
pub(crate) use users::{delete_user, insert_user, load_user};
pub(crate) use votes::{count_votes, has_voted, insert_vote, monthly_vote_counts};
pub(crate) use winners::{
    insert_winner_if_absent, load_recent_winners, load_winners_for_month,
};

pub(crate) type Transaction<'a> = ::sqlx::Transaction<'a, ::sqlx::Sqlite>;

pub(crate) async fn prepare_database(
    transaction: &mut Transaction<'_>,
) -> ::sqlx::Result<()> {
    (&mut **transaction).execute(include_str!("schema.sql")).await?;
    Ok(())
}

/// Opens a transaction that holds the database write lock from its first
/// statement. A deferred transaction that reads before writing fails with
/// `SQLITE_BUSY` instead of waiting when another writer got there first.
pub(crate) async fn begin_write(
    pool: &::sqlx::SqlitePool,
) -> ::sqlx::Result<Transaction<'static>> {
    let mut transaction = pool.begin().await?;

    // touches no rows, but acquires the reserved lock
    (&mut *transaction)
        .execute("UPDATE users SET id = id WHERE 0;")
        .await?;

    Ok(transaction)
}

pub(crate) async fn connect(
    database_url: &str,
    max_connections: u32,
) -> ::sqlx::Result<::sqlx::SqlitePool> {
    let options = database_url
        .parse::<::sqlx::sqlite::SqliteConnectOptions>()?
        .create_if_missing(true)
        .foreign_keys(true);

    ::sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

pub(crate) fn to_unix_milliseconds(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_unix_milliseconds(
    milliseconds: i64,
) -> ::sqlx::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(milliseconds).single().ok_or_else(|| {
        ::sqlx::Error::Decode(
            format!("timestamp out of range: {}", milliseconds).into(),
        )
    })
}

pub(crate) fn count_to_u64(count: i64) -> ::sqlx::Result<u64> {
    u64::try_from(count).map_err(|err| ::sqlx::Error::Decode(Box::new(err)))
}
