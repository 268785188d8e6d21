use ::serde_json::json;

#[derive(::serde::Deserialize)]
pub(crate) struct Query {
    #[serde(rename = "type")]
    post_type: Option<String>,
    grade_level: Option<String>,
}

pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
    query: Query,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(crate::warp_try_forum!(handler_inner(state, user_id, query).await))
}

async fn handler_inner(
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
    query: Query,
) -> crate::error::Result<Box<dyn ::warp::Reply>> {
    let post_type =
        crate::handlers::parse_optional(query.post_type.as_deref())?;
    let grade_level =
        crate::handlers::parse_optional(query.grade_level.as_deref())?;

    let mut transaction = state.pool.begin().await?;

    let caller = crate::handlers::load_caller(&mut transaction, user_id).await?;

    let posts = crate::posts::list_visible_posts(
        &mut transaction,
        &caller,
        post_type,
        grade_level,
        &::chrono::Utc::now(),
    )
    .await?;

    transaction.commit().await?;

    Ok(crate::handlers::json_reply(
        &json!({ "posts": posts }),
        ::warp::http::StatusCode::OK,
    ))
}
