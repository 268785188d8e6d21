use ::std::collections::BTreeMap;

use crate::model::{Audience, GradeLevel, PostType, Role};

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct Stats {
    pub total_users: u64,
    pub active_users: u64,
    pub total_posts: u64,
    pub published_posts: u64,
    pub total_votes: u64,
    pub users_by_role: BTreeMap<Role, u64>,
    pub users_by_grade: BTreeMap<GradeLevel, u64>,
    pub posts_by_type: BTreeMap<PostType, u64>,
    pub posts_by_grade: BTreeMap<Audience, u64>,
}

async fn count(
    transaction: &mut crate::sqlite::Transaction<'_>,
    query: &str,
) -> ::sqlx::Result<u64> {
    let count = ::sqlx::query_scalar::<_, i64>(query)
        .fetch_one(&mut **transaction)
        .await?;

    crate::sqlite::count_to_u64(count)
}

/// Every key of `keys` is present in the result, zero when absent from
/// the table.
async fn count_by<K>(
    transaction: &mut crate::sqlite::Transaction<'_>,
    query: &str,
    keys: &[K],
) -> ::sqlx::Result<BTreeMap<K, u64>>
where
    K: Ord
        + Copy
        + Send
        + Unpin
        + for<'r> ::sqlx::Decode<'r, ::sqlx::Sqlite>
        + ::sqlx::Type<::sqlx::Sqlite>,
{
    let mut counts: BTreeMap<K, u64> =
        keys.iter().map(|key| (*key, 0)).collect();

    let rows = ::sqlx::query_as::<_, (K, i64)>(query)
        .fetch_all(&mut **transaction)
        .await?;

    for (key, count) in rows {
        counts.insert(key, crate::sqlite::count_to_u64(count)?);
    }

    Ok(counts)
}

pub(crate) async fn load_stats(
    transaction: &mut crate::sqlite::Transaction<'_>,
) -> ::sqlx::Result<Stats> {
    Ok(Stats {
        total_users: count(transaction, "SELECT COUNT(*) FROM users;").await?,
        active_users: count(
            transaction,
            "SELECT COUNT(*) FROM users WHERE is_active = 1;",
        )
        .await?,
        total_posts: count(transaction, "SELECT COUNT(*) FROM posts;").await?,
        published_posts: count(
            transaction,
            "SELECT COUNT(*) FROM posts WHERE is_published = 1;",
        )
        .await?,
        total_votes: count(transaction, "SELECT COUNT(*) FROM votes;").await?,
        users_by_role: count_by(
            transaction,
            "SELECT role, COUNT(*) FROM users GROUP BY role;",
            &Role::ALL,
        )
        .await?,
        users_by_grade: count_by(
            transaction,
            "SELECT grade_level, COUNT(*) FROM users GROUP BY grade_level;",
            &GradeLevel::ALL,
        )
        .await?,
        posts_by_type: count_by(
            transaction,
            "SELECT post_type, COUNT(*) FROM posts GROUP BY post_type;",
            &PostType::ALL,
        )
        .await?,
        posts_by_grade: count_by(
            transaction,
            "SELECT grade_level, COUNT(*) FROM posts GROUP BY grade_level;",
            &Audience::ALL,
        )
        .await?,
    })
}
