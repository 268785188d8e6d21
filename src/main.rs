use ::log::*;
use ::warp::Filter;

mod config;
mod error;
mod handlers;
mod model;
mod posts;
mod seeder;
mod sqlite;
#[cfg(test)]
mod test_utils;
mod users;
mod voting;
mod winners;

pub(crate) struct State {
    pool: ::sqlx::SqlitePool,
    statsd_client: ::cadence::StatsdClient,
}

/// Unwraps a `Result<_, ForumError>` or returns the error as a reply.
#[macro_export]
macro_rules! warp_try_forum {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                return Ok($crate::error::ForumError::into_reply(err));
            }
        }
    };
}

async fn handle_rejection(
    err: ::warp::Rejection,
) -> Result<impl ::warp::Reply, ::std::convert::Infallible> {
    use ::warp::http::StatusCode;

    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found")
    } else if err.find::<::warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid query string")
    } else if err.find::<::warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
    } else if err.find::<::warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else {
        warn!("rejection {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    };

    Ok(::warp::reply::with_status(
        ::warp::reply::json(&::serde_json::json!({ "error": message })),
        status,
    ))
}

pub(crate) fn routes(
    state: ::std::sync::Arc<State>,
) -> impl Filter<Extract = (impl ::warp::Reply,), Error = ::std::convert::Infallible>
       + Clone {
    let cors = ::warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", crate::handlers::USER_ID_HEADER])
        .allow_methods(&[
            ::warp::http::Method::POST,
            ::warp::http::Method::GET,
            ::warp::http::Method::PUT,
            ::warp::http::Method::DELETE,
        ]);

    let state_filter = ::warp::any().map(move || state.clone());

    let caller_filter =
        ::warp::header::optional::<String>(crate::handlers::USER_ID_HEADER);

    let get_health_route = ::warp::path!("api" / "health")
        .and(::warp::get())
        .and(state_filter.clone())
        .and_then(crate::handlers::get_health::handler)
        .with(cors.clone());

    let get_posts_route = ::warp::path!("api" / "posts")
        .and(::warp::get())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and(::warp::query::<crate::handlers::get_posts::Query>())
        .and_then(crate::handlers::get_posts::handler)
        .with(cors.clone());

    let post_posts_route = ::warp::path!("api" / "posts")
        .and(::warp::post())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and(::warp::body::content_length_limit(1024 * 64))
        .and(::warp::body::bytes())
        .and_then(crate::handlers::post_posts::handler)
        .with(cors.clone());

    let get_winners_route = ::warp::path!("api" / "posts" / "winners")
        .and(::warp::get())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and(::warp::query::<crate::handlers::get_winners::Query>())
        .and_then(crate::handlers::get_winners::handler)
        .with(cors.clone());

    let get_recent_winners_route =
        ::warp::path!("api" / "posts" / "winners" / "recent")
            .and(::warp::get())
            .and(state_filter.clone())
            .and(caller_filter.clone())
            .and(::warp::query::<crate::handlers::get_recent_winners::Query>())
            .and_then(crate::handlers::get_recent_winners::handler)
            .with(cors.clone());

    let get_top_articles_route =
        ::warp::path!("api" / "posts" / "top-articles")
            .and(::warp::get())
            .and(state_filter.clone())
            .and(caller_filter.clone())
            .and(::warp::query::<crate::handlers::get_top_articles::Query>())
            .and_then(crate::handlers::get_top_articles::handler)
            .with(cors.clone());

    let get_post_route = ::warp::path!("api" / "posts" / i64)
        .and(::warp::get())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and_then(crate::handlers::get_post::handler)
        .with(cors.clone());

    let put_post_route = ::warp::path!("api" / "posts" / i64)
        .and(::warp::put())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and(::warp::body::content_length_limit(1024 * 64))
        .and(::warp::body::bytes())
        .and_then(crate::handlers::put_post::handler)
        .with(cors.clone());

    let delete_post_route = ::warp::path!("api" / "posts" / i64)
        .and(::warp::delete())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and_then(crate::handlers::delete_post::handler)
        .with(cors.clone());

    let post_vote_route = ::warp::path!("api" / "posts" / i64 / "vote")
        .and(::warp::post())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and_then(crate::handlers::post_vote::handler)
        .with(cors.clone());

    let post_calculate_winners_route =
        ::warp::path!("api" / "admin" / "calculate-winners")
            .and(::warp::post())
            .and(state_filter.clone())
            .and(caller_filter.clone())
            .and(::warp::body::bytes())
            .and_then(crate::handlers::post_calculate_winners::handler)
            .with(cors.clone());

    let delete_user_route = ::warp::path!("api" / "admin" / "users" / i64)
        .and(::warp::delete())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and_then(crate::handlers::delete_user::handler)
        .with(cors.clone());

    let get_stats_route = ::warp::path!("api" / "admin" / "stats")
        .and(::warp::get())
        .and(state_filter.clone())
        .and(caller_filter.clone())
        .and_then(crate::handlers::get_stats::handler)
        .with(cors.clone());

    get_health_route
        .or(get_posts_route)
        .or(post_posts_route)
        .or(get_winners_route)
        .or(get_recent_winners_route)
        .or(get_top_articles_route)
        .or(get_post_route)
        .or(put_post_route)
        .or(delete_post_route)
        .or(post_vote_route)
        .or(post_calculate_winners_route)
        .or(delete_user_route)
        .or(get_stats_route)
        .recover(handle_rejection)
        .with(::warp::log("school_forum::api"))
}

async fn serve_api(
    config: &crate::config::Config,
    pool: ::sqlx::SqlitePool,
) -> Result<(), Box<dyn ::std::error::Error>> {
    let socket = ::std::net::UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;

    let udp_sink = ::cadence::UdpMetricSink::from(
        (config.statsd_address.as_str(), config.statsd_port),
        socket,
    )?;

    let queuing_sink = ::cadence::QueuingMetricSink::from(udp_sink);

    let statsd_client =
        ::cadence::StatsdClient::from_sink("school_forum", queuing_sink);

    let state = ::std::sync::Arc::new(State {
        pool,
        statsd_client,
    });

    info!("Listening on {}", config.http_port_api);

    ::warp::serve(routes(state))
        .run(([0, 0, 0, 0], config.http_port_api))
        .await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn ::std::error::Error>> {
    ::env_logger::init();

    let config = crate::config::Config::from_env()?;

    info!("Connecting to {}", config.database_url);

    let pool = crate::sqlite::connect(
        &config.database_url,
        config.database_max_connections,
    )
    .await?;

    let mut transaction = pool.begin().await?;
    crate::sqlite::prepare_database(&mut transaction).await?;
    transaction.commit().await?;

    match config.mode {
        crate::config::Mode::Seed => {
            crate::seeder::seed(&pool, &::chrono::Utc::now()).await?;
            Ok(())
        }
        crate::config::Mode::ServeAPI => serve_api(&config, pool).await,
    }
}
