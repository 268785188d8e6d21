use ::cadence::Counted;
use ::log::*;

use crate::error::{ForumError, Result};
use crate::model::User;

pub(crate) mod delete_post;
pub(crate) mod delete_user;
pub(crate) mod get_health;
pub(crate) mod get_post;
pub(crate) mod get_posts;
pub(crate) mod get_recent_winners;
pub(crate) mod get_stats;
pub(crate) mod get_top_articles;
pub(crate) mod get_winners;
pub(crate) mod post_calculate_winners;
pub(crate) mod post_posts;
pub(crate) mod post_vote;
pub(crate) mod put_post;

/// Set by the authenticating proxy in front of the API.
pub(crate) const USER_ID_HEADER: &str = "x-user-id";

pub(crate) async fn load_caller(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user_id: Option<String>,
) -> Result<User> {
    let user_id = user_id
        .as_deref()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or(ForumError::Unauthenticated)?;

    crate::users::load_caller(transaction, user_id).await
}

/// Empty query parameters count as absent.
pub(crate) fn parse_optional<T>(value: Option<&str>) -> Result<Option<T>>
where
    T: ::std::str::FromStr<Err = ForumError>,
{
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

pub(crate) fn parse_json<T>(bytes: &[u8]) -> Result<T>
where
    T: ::serde::de::DeserializeOwned,
{
    if bytes.is_empty() {
        return Err(ForumError::Validation("request body required".to_string()));
    }

    ::serde_json::from_slice(bytes).map_err(|err| {
        ForumError::Validation(format!("invalid request body: {}", err))
    })
}

pub(crate) fn count_metric(state: &crate::State, metric: &str, value: i64) {
    if let Err(err) = state.statsd_client.count(metric, value) {
        warn!("Unable to log {} metric due to: {}", metric, err);
    }
}

pub(crate) fn json_reply<T>(
    value: &T,
    status: ::warp::http::StatusCode,
) -> Box<dyn ::warp::Reply>
where
    T: ::serde::Serialize,
{
    Box::new(::warp::reply::with_status(::warp::reply::json(value), status))
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::model::{GradeLevel, PostType};

    #[test]
    fn blank_parameters_are_absent() {
        assert_eq!(parse_optional::<GradeLevel>(None).unwrap(), None);
        assert_eq!(parse_optional::<GradeLevel>(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_optional::<PostType>(Some("reminder")).unwrap(),
            Some(PostType::Reminder)
        );
        assert!(matches!(
            parse_optional::<GradeLevel>(Some("kindergarten")),
            Err(ForumError::Validation(_))
        ));
    }

    #[test]
    fn malformed_bodies_are_validation_errors() {
        assert!(matches!(
            parse_json::<crate::posts::NewPost>(b"{"),
            Err(ForumError::Validation(_))
        ));
        assert!(matches!(
            parse_json::<crate::posts::NewPost>(b""),
            Err(ForumError::Validation(_))
        ));
        assert!(parse_json::<crate::posts::NewPost>(b"{}").is_ok());
    }
}
