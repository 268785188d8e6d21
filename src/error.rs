use ::log::*;

#[derive(Debug, ::thiserror::Error)]
pub(crate) enum ForumError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    Access(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("database error: {0}")]
    Storage(#[from] ::sqlx::Error),
}

pub(crate) type Result<T> = ::std::result::Result<T, ForumError>;

impl ForumError {
    /// Translates a unique constraint violation into `Conflict`, anything
    /// else stays a storage error.
    pub(crate) fn conflict_on_unique(
        err: ::sqlx::Error,
        message: &str,
    ) -> ForumError {
        match &err {
            ::sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ForumError::Conflict(message.to_string())
            }
            _ => ForumError::Storage(err),
        }
    }

    pub(crate) fn status(&self) -> ::warp::http::StatusCode {
        use ::warp::http::StatusCode;

        match self {
            ForumError::Validation(_) => StatusCode::BAD_REQUEST,
            ForumError::Permission(_) => StatusCode::FORBIDDEN,
            ForumError::Access(_) => StatusCode::FORBIDDEN,
            ForumError::Conflict(_) => StatusCode::CONFLICT,
            ForumError::NotFound(_) => StatusCode::NOT_FOUND,
            ForumError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ForumError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn into_reply(self) -> Box<dyn ::warp::Reply> {
        let status = self.status();

        if status.is_server_error() {
            error!("request failed: {}", self);
        } else {
            warn!("request rejected: {}", self);
        }

        // storage details stay in the log
        let message = match &self {
            ForumError::Storage(_) => "internal server error".to_string(),
            _ => self.to_string(),
        };

        Box::new(::warp::reply::with_status(
            ::warp::reply::json(&::serde_json::json!({ "error": message })),
            status,
        ))
    }
}
