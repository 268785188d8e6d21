use crate::model::VoteMonth;

#[derive(Default, ::serde::Deserialize)]
struct Request {
    month: Option<String>,
}

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
    // an empty body means the current month
    let request: Request = if bytes.is_empty() {
        Request::default()
    } else {
        crate::handlers::parse_json(&bytes)?
    };

    let month = crate::handlers::parse_optional(request.month.as_deref())?
        .unwrap_or_else(VoteMonth::current);

    let caller = {
        let mut transaction = state.pool.begin().await?;
        let caller =
            crate::handlers::load_caller(&mut transaction, user_id).await?;
        transaction.commit().await?;
        caller
    };

    let calculation = crate::winners::calculate_monthly_winners(
        &state.pool,
        &caller,
        &month,
        &::chrono::Utc::now(),
    )
    .await?;

    crate::handlers::count_metric(
        &state,
        "winners.created",
        i64::try_from(calculation.winners.len()).unwrap_or(i64::MAX),
    );

    Ok(crate::handlers::json_reply(
        &calculation,
        ::warp::http::StatusCode::OK,
    ))
}
