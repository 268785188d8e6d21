use ::warp::reply::Response;
use ::warp::{http::StatusCode, Reply};

/// 200 while the database answers within two seconds, otherwise 503.
pub(crate) async fn handler(
    state: ::std::sync::Arc<crate::State>,
) -> Result<Response, ::std::convert::Infallible> {
    use ::serde_json::json;
    use ::tokio::time::{timeout, Duration};

    let db_ok = timeout(Duration::from_secs(2), async {
        ::sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&state.pool)
            .await
            .is_ok()
    })
    .await
    .unwrap_or(false);

    let body = json!({
        "db": db_ok,
        "status": if db_ok { "ok" } else { "degraded" }
    });

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok(
        ::warp::reply::with_status(::warp::reply::json(&body), status)
            .into_response(),
    )
}
