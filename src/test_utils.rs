use ::cadence::{NopMetricSink, StatsdClient};
use ::chrono::{DateTime, TimeZone, Utc};

use crate::model::{
    Audience, GradeLevel, NewUser, Post, PostDraft, PostType, Role, User,
    VoteMonth,
};

/// Noon UTC on the given day.
pub(crate) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid test date")
}

pub(crate) async fn make_user(
    transaction: &mut crate::sqlite::Transaction<'_>,
    username: &str,
    role: Role,
    grade_level: GradeLevel,
) -> ::sqlx::Result<User> {
    crate::sqlite::insert_user(
        transaction,
        &NewUser {
            username: username.to_string(),
            email: format!("{}@school.bt", username),
            role,
            grade_level,
            first_name: username.to_string(),
            last_name: "Tester".to_string(),
        },
        &at(2024, 1, 1),
    )
    .await
}

/// Students of one grade named `prefix0`, `prefix1`, ...
pub(crate) async fn make_voters(
    transaction: &mut crate::sqlite::Transaction<'_>,
    prefix: &str,
    grade_level: GradeLevel,
    count: usize,
) -> ::sqlx::Result<::std::vec::Vec<User>> {
    let mut voters = vec![];

    for index in 0..count {
        voters.push(
            make_user(
                transaction,
                &format!("{}{}", prefix, index),
                Role::Student,
                grade_level,
            )
            .await?,
        );
    }

    Ok(voters)
}

pub(crate) async fn make_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    author: &User,
    post_type: PostType,
    grade_level: Audience,
) -> ::sqlx::Result<Post> {
    crate::sqlite::insert_post(
        transaction,
        author.id,
        &PostDraft {
            title: format!("{} for {}", post_type.as_str(), grade_level.as_str()),
            content: "content".to_string(),
            post_type,
            grade_level,
            is_published: true,
            expires_at: None,
        },
        &at(2024, 1, 1),
    )
    .await
}

/// One vote per voter on `post`, cast on the first day of `month`.
pub(crate) async fn add_votes(
    transaction: &mut crate::sqlite::Transaction<'_>,
    voters: &[User],
    post: &Post,
    month: &VoteMonth,
) -> ::sqlx::Result<()> {
    let now = format!("{}-01T12:00:00Z", month)
        .parse::<DateTime<Utc>>()
        .expect("valid month");

    for voter in voters {
        crate::sqlite::insert_vote(transaction, voter.id, post.id, month, &now)
            .await?;
    }

    Ok(())
}

pub(crate) async fn make_state(
    pool: ::sqlx::SqlitePool,
) -> ::anyhow::Result<::std::sync::Arc<crate::State>> {
    let mut transaction = pool.begin().await?;
    crate::sqlite::prepare_database(&mut transaction).await?;
    transaction.commit().await?;

    Ok(::std::sync::Arc::new(crate::State {
        pool,
        statsd_client: StatsdClient::from_sink("school_forum", NopMetricSink),
    }))
}
