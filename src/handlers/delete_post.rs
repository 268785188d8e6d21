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

    crate::posts::delete_post(&mut transaction, &caller, post_id).await?;

    transaction.commit().await?;

    crate::handlers::count_metric(&state, "posts.deleted", 1);

    Ok(crate::handlers::json_reply(
        &json!({ "message": "Post deleted successfully" }),
        ::warp::http::StatusCode::OK,
    ))
}
