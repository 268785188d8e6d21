use ::serde_json::json;

pub(crate) async fn handler(
    post_id: i64,
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(crate::warp_try_forum!(handler_inner(post_id, state, user_id).await))
}

async fn handler_inner(
    post_id: i64,
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
) -> crate::error::Result<Box<dyn ::warp::Reply>> {
    let mut transaction = crate::sqlite::begin_write(&state.pool).await?;

    let caller = crate::handlers::load_caller(&mut transaction, user_id).await?;

    let receipt = crate::voting::cast_vote(
        &mut transaction,
        &caller,
        post_id,
        &::chrono::Utc::now(),
    )
    .await?;

    transaction.commit().await?;

    crate::handlers::count_metric(&state, "votes.cast", 1);

    Ok(crate::handlers::json_reply(
        &json!({
            "message": "Vote recorded successfully",
            "vote_month": receipt.vote.vote_month,
            "vote_count": receipt.vote_count,
        }),
        ::warp::http::StatusCode::CREATED,
    ))
}
