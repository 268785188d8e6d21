use ::serde_json::json;

pub(crate) async fn handler(
    post_id: i64,
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
    bytes: ::warp::hyper::body::Bytes,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(crate::warp_try_forum!(
        handler_inner(post_id, state, user_id, bytes).await
    ))
}

async fn handler_inner(
    post_id: i64,
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
    bytes: ::warp::hyper::body::Bytes,
) -> crate::error::Result<Box<dyn ::warp::Reply>> {
    let mut transaction = crate::sqlite::begin_write(&state.pool).await?;

    let caller = crate::handlers::load_caller(&mut transaction, user_id).await?;

    let update: crate::posts::UpdatePost = crate::handlers::parse_json(&bytes)?;

    let post = crate::posts::update_post(
        &mut transaction,
        &caller,
        post_id,
        &update.changes()?,
        &::chrono::Utc::now(),
    )
    .await?;

    transaction.commit().await?;

    Ok(crate::handlers::json_reply(
        &json!({
            "message": "Post updated successfully",
            "post": post,
        }),
        ::warp::http::StatusCode::OK,
    ))
}
