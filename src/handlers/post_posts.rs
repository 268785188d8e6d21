use ::serde_json::json;

pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
    bytes: ::warp::hyper::body::Bytes,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(crate::warp_try_forum!(handler_inner(state, user_id, bytes).await))
}

async fn handler_inner(
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
    bytes: ::warp::hyper::body::Bytes,
) -> crate::error::Result<Box<dyn ::warp::Reply>> {
    let mut transaction = crate::sqlite::begin_write(&state.pool).await?;

    let caller = crate::handlers::load_caller(&mut transaction, user_id).await?;

    let new_post: crate::posts::NewPost = crate::handlers::parse_json(&bytes)?;

    let post = crate::posts::create_post(
        &mut transaction,
        &caller,
        &new_post,
        &::chrono::Utc::now(),
    )
    .await?;

    transaction.commit().await?;

    crate::handlers::count_metric(&state, "posts.created", 1);

    Ok(crate::handlers::json_reply(
        &json!({
            "message": "Post created successfully",
            "post": post,
        }),
        ::warp::http::StatusCode::CREATED,
    ))
}
