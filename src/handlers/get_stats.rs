use ::serde_json::json;

use crate::error::ForumError;

pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
) -> Result<Box<dyn ::warp::Reply>, ::std::convert::Infallible> {
    Ok(crate::warp_try_forum!(handler_inner(state, user_id).await))
}

async fn handler_inner(
    state: ::std::sync::Arc<crate::State>,
    user_id: Option<String>,
) -> crate::error::Result<Box<dyn ::warp::Reply>> {
    let mut transaction = state.pool.begin().await?;

    let caller = crate::handlers::load_caller(&mut transaction, user_id).await?;

    if !caller.can_moderate() {
        return Err(ForumError::Permission(
            "permission denied: admin access required".to_string(),
        ));
    }

    let stats = crate::sqlite::load_stats(&mut transaction).await?;

    transaction.commit().await?;

    Ok(crate::handlers::json_reply(
        &json!({ "stats": stats }),
        ::warp::http::StatusCode::OK,
    ))
}
