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
    let mut transaction = state.pool.begin().await?;

    let caller = crate::handlers::load_caller(&mut transaction, user_id).await?;

    let post = crate::posts::get_post(
        &mut transaction,
        &caller,
        post_id,
        &::chrono::Utc::now(),
    )
    .await?;

    transaction.commit().await?;

    Ok(crate::handlers::json_reply(
        &json!({ "post": post }),
        ::warp::http::StatusCode::OK,
    ))
}
