use ::chrono::{DateTime, Utc};
use ::log::*;

use crate::error::{ForumError, Result};
use crate::model::{NewUser, User};

fn email_pattern() -> &'static ::regex::Regex {
    static PATTERN: ::std::sync::OnceLock<::regex::Regex> =
        ::std::sync::OnceLock::new();

    PATTERN.get_or_init(|| {
        ::regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .expect("valid email regex")
    })
}

fn validate(user: &NewUser) -> Result<()> {
    for (field, value) in [
        ("username", &user.username),
        ("first_name", &user.first_name),
        ("last_name", &user.last_name),
    ] {
        if value.trim().is_empty() {
            return Err(ForumError::Validation(format!("{} is required", field)));
        }
    }

    let email = user.email.trim();

    if !email_pattern().is_match(email) {
        return Err(ForumError::Validation(format!(
            "invalid email address: {}",
            email
        )));
    }

    Ok(())
}

pub(crate) async fn register_user(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user: &NewUser,
    now: &DateTime<Utc>,
) -> Result<User> {
    validate(user)?;

    let user = crate::sqlite::insert_user(transaction, user, now)
        .await
        .map_err(|err| {
            ForumError::conflict_on_unique(
                err,
                "username or email already registered",
            )
        })?;

    info!(
        "registered {} {} as user {}",
        user.role.as_str(),
        user.username,
        user.id
    );

    Ok(user)
}

/// The user behind a request. Unknown and deactivated accounts are
/// treated as unauthenticated.
pub(crate) async fn load_caller(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user_id: i64,
) -> Result<User> {
    match crate::sqlite::load_user(transaction, user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ForumError::Unauthenticated),
    }
}

/// Removes a user with their posts and votes. Admins only, and never
/// themselves.
pub(crate) async fn delete_user(
    transaction: &mut crate::sqlite::Transaction<'_>,
    actor: &User,
    user_id: i64,
) -> Result<()> {
    if !actor.can_moderate() {
        return Err(ForumError::Permission(
            "permission denied: admin access required".to_string(),
        ));
    }

    if actor.id == user_id {
        return Err(ForumError::Validation(
            "cannot delete your own account".to_string(),
        ));
    }

    if !crate::sqlite::delete_user(transaction, user_id).await? {
        return Err(ForumError::NotFound(format!("user {} not found", user_id)));
    }

    info!("user {} deleted user {}", actor.id, user_id);

    Ok(())
}
