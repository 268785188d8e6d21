use ::chrono::{DateTime, Utc};
use ::log::*;

use crate::error::{ForumError, Result};
use crate::model::{GradeLevel, Post, User, Vote, VoteMonth};

const TOP_ARTICLES_LIMIT: usize = 10;

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct VoteReceipt {
    pub vote: Vote,
    /// Votes the post has received in the vote's month, this one included.
    pub vote_count: u64,
}

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct TopArticle {
    #[serde(flatten)]
    pub post: Post,
    pub vote_count: u64,
    pub user_has_voted: bool,
}

/// Records one vote by `voter` for the month containing `now`.
pub(crate) async fn cast_vote(
    transaction: &mut crate::sqlite::Transaction<'_>,
    voter: &User,
    post_id: i64,
    now: &DateTime<Utc>,
) -> Result<VoteReceipt> {
    if !voter.can_vote() {
        return Err(ForumError::Permission(
            "permission denied: inactive users cannot vote".to_string(),
        ));
    }

    let not_found = || ForumError::NotFound(format!("post {} not found", post_id));

    let post = crate::sqlite::load_post(transaction, post_id)
        .await?
        .ok_or_else(not_found)?;

    // unpublished posts are hidden from everyone but their author and admins
    if !post.is_published && !voter.is_admin() && post.author_id != voter.id {
        return Err(not_found());
    }

    if !post.can_be_voted_on() {
        return Err(ForumError::Validation(
            "this post cannot be voted on".to_string(),
        ));
    }

    if !post.is_accessible_by(voter) {
        return Err(ForumError::Access("access denied".to_string()));
    }

    let month = VoteMonth::containing(now);

    // the unique index decides between concurrent duplicates
    let vote =
        crate::sqlite::insert_vote(transaction, voter.id, post.id, &month, now)
            .await
            .map_err(|err| {
                ForumError::conflict_on_unique(
                    err,
                    "you have already voted on this article this month",
                )
            })?;

    let vote_count =
        crate::sqlite::count_votes(transaction, post.id, Some(&month)).await?;

    info!(
        "user {} voted for post {} in {} ({} votes)",
        voter.id, post.id, month, vote_count
    );

    Ok(VoteReceipt { vote, vote_count })
}

/// Most voted articles of `month` within the grades `viewer` may see. A
/// requested grade the viewer cannot see is an `Access` error.
pub(crate) async fn top_articles(
    transaction: &mut crate::sqlite::Transaction<'_>,
    viewer: &User,
    requested_grade: Option<GradeLevel>,
    month: &VoteMonth,
) -> Result<::std::vec::Vec<TopArticle>> {
    let scope = crate::model::grade_scope(viewer, requested_grade)?;

    let ranked = match requested_grade {
        Some(grade) => {
            crate::sqlite::monthly_vote_counts(
                transaction,
                month,
                Some(grade.into()),
                Some(TOP_ARTICLES_LIMIT as u32),
            )
            .await?
        }
        None => crate::sqlite::monthly_vote_counts(transaction, month, None, None)
            .await?
            .into_iter()
            .filter(|count| {
                count
                    .grade_level
                    .grade()
                    .map_or(false, |grade| scope.contains(&grade))
            })
            .take(TOP_ARTICLES_LIMIT)
            .collect(),
    };

    let mut result = vec![];

    for count in ranked {
        let post = match crate::sqlite::load_post(transaction, count.post_id)
            .await?
        {
            Some(post) => post,
            None => continue,
        };

        let user_has_voted =
            crate::sqlite::has_voted(transaction, viewer.id, post.id, month)
                .await?;

        result.push(TopArticle {
            post,
            vote_count: count.vote_count,
            user_has_voted,
        });
    }

    Ok(result)
}
