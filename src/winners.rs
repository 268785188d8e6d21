use ::chrono::{DateTime, Utc};
use ::log::*;

use crate::error::{ForumError, Result};
use crate::model::{GradeLevel, MonthlyWinner, User, VoteMonth};

pub(crate) const DEFAULT_RECENT_WINNERS: u32 = 5;
pub(crate) const MAX_RECENT_WINNERS: u32 = 100;

/// What happened to one grade during a winner calculation.
#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum GradeOutcome {
    Created { winner: MonthlyWinner },
    NoVotes,
    AlreadyDecided,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct GradeReport {
    pub grade_level: GradeLevel,
    #[serde(flatten)]
    pub outcome: GradeOutcome,
}

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct WinnerCalculation {
    pub month: VoteMonth,
    /// Winners recorded by this calculation only.
    pub winners: ::std::vec::Vec<MonthlyWinner>,
    pub grades: ::std::vec::Vec<GradeReport>,
}

/// Decides the winner of one grade for `month`. Ties go to the lowest post
/// id. An existing winner is never replaced.
pub(crate) async fn calculate_grade_winner(
    transaction: &mut crate::sqlite::Transaction<'_>,
    month: &VoteMonth,
    grade_level: GradeLevel,
    now: &DateTime<Utc>,
) -> ::sqlx::Result<GradeOutcome> {
    let existing = crate::sqlite::load_winners_for_month(
        transaction,
        month,
        Some(grade_level),
    )
    .await?;

    if !existing.is_empty() {
        return Ok(GradeOutcome::AlreadyDecided);
    }

    let top = crate::sqlite::monthly_vote_counts(
        transaction,
        month,
        Some(grade_level.into()),
        Some(1),
    )
    .await?;

    let top = match top.into_iter().next() {
        Some(top) if top.vote_count > 0 => top,
        _ => return Ok(GradeOutcome::NoVotes),
    };

    let inserted = crate::sqlite::insert_winner_if_absent(
        transaction,
        top.post_id,
        month,
        grade_level,
        top.vote_count,
        now,
    )
    .await?;

    Ok(match inserted {
        Some(winner) => GradeOutcome::Created { winner },
        None => GradeOutcome::AlreadyDecided,
    })
}

async fn calculate_in_own_transaction(
    pool: &::sqlx::SqlitePool,
    month: &VoteMonth,
    grade_level: GradeLevel,
    now: &DateTime<Utc>,
) -> ::sqlx::Result<GradeOutcome> {
    let mut transaction = crate::sqlite::begin_write(pool).await?;

    let outcome =
        calculate_grade_winner(&mut transaction, month, grade_level, now)
            .await?;

    transaction.commit().await?;

    Ok(outcome)
}

/// Computes the winners of every grade for `month`. Each grade commits on
/// its own so a failure is reported against that grade only.
pub(crate) async fn calculate_monthly_winners(
    pool: &::sqlx::SqlitePool,
    actor: &User,
    month: &VoteMonth,
    now: &DateTime<Utc>,
) -> Result<WinnerCalculation> {
    if !actor.can_moderate() {
        return Err(ForumError::Permission(
            "permission denied: admin access required".to_string(),
        ));
    }

    let mut winners = vec![];
    let mut grades = vec![];

    for grade_level in GradeLevel::ALL {
        let outcome =
            match calculate_in_own_transaction(pool, month, grade_level, now)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(
                        "winner calculation for {} {} failed: {}",
                        month, grade_level, err
                    );

                    GradeOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };

        if let GradeOutcome::Created { winner } = &outcome {
            info!(
                "post {} won {} for {} with {} votes",
                winner.post_id, month, grade_level, winner.vote_count
            );

            winners.push(winner.clone());
        }

        grades.push(GradeReport {
            grade_level,
            outcome,
        });
    }

    Ok(WinnerCalculation {
        month: *month,
        winners,
        grades,
    })
}

/// Winners of `month` in the grades `viewer` may see.
pub(crate) async fn winners_for_month(
    transaction: &mut crate::sqlite::Transaction<'_>,
    viewer: &User,
    month: &VoteMonth,
    requested_grade: Option<GradeLevel>,
) -> Result<::std::vec::Vec<MonthlyWinner>> {
    let scope = crate::model::grade_scope(viewer, requested_grade)?;

    let winners =
        crate::sqlite::load_winners_for_month(transaction, month, requested_grade)
            .await?;

    Ok(winners
        .into_iter()
        .filter(|winner| scope.contains(&winner.grade_level))
        .collect())
}

/// Latest winners across months, newest first.
pub(crate) async fn recent_winners(
    transaction: &mut crate::sqlite::Transaction<'_>,
    viewer: &User,
    limit: Option<u32>,
    requested_grade: Option<GradeLevel>,
) -> Result<::std::vec::Vec<MonthlyWinner>> {
    let limit = limit.unwrap_or(DEFAULT_RECENT_WINNERS);

    if limit == 0 || limit > MAX_RECENT_WINNERS {
        return Err(ForumError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_RECENT_WINNERS
        )));
    }

    let scope = crate::model::grade_scope(viewer, requested_grade)?;

    // a single visible grade can be limited in the query itself
    let grade_filter = match scope.as_slice() {
        [grade] => Some(*grade),
        _ => None,
    };

    let winners =
        crate::sqlite::load_recent_winners(transaction, limit, grade_filter)
            .await?;

    Ok(winners
        .into_iter()
        .filter(|winner| scope.contains(&winner.grade_level))
        .collect())
}
