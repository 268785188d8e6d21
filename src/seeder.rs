use ::chrono::{DateTime, Utc};
use ::log::*;

use crate::error::ForumError;
use crate::model::{GradeLevel, NewUser, Role};

fn demo_users() -> ::std::vec::Vec<NewUser> {
    let mut users = vec![
        NewUser {
            username: "admin".to_string(),
            email: "admin@school.bt".to_string(),
            role: Role::Admin,
            grade_level: GradeLevel::Senior,
            first_name: "School".to_string(),
            last_name: "Administrator".to_string(),
        },
        NewUser {
            username: "language_teacher".to_string(),
            email: "language.teacher@school.bt".to_string(),
            role: Role::LanguageTeacher,
            grade_level: GradeLevel::Middle,
            first_name: "Karma".to_string(),
            last_name: "Wangchuk".to_string(),
        },
    ];

    for grade_level in GradeLevel::ALL {
        users.push(NewUser {
            username: format!("{}_student", grade_level.as_str()),
            email: format!("{}.student@school.bt", grade_level.as_str()),
            role: Role::Student,
            grade_level,
            first_name: "Demo".to_string(),
            last_name: format!("{} Student", grade_level.as_str()),
        });
    }

    users
}

/// Inserts the demo accounts. Running it again leaves existing accounts
/// untouched. Returns how many accounts were created.
pub(crate) async fn seed(
    pool: &::sqlx::SqlitePool,
    now: &DateTime<Utc>,
) -> crate::error::Result<usize> {
    info!("Seeding demo users");

    let mut transaction = crate::sqlite::begin_write(pool).await?;
    let mut created = 0;

    for user in demo_users() {
        match crate::users::register_user(&mut transaction, &user, now).await {
            Ok(_) => created += 1,
            Err(ForumError::Conflict(_)) => {
                debug!("{} already exists", user.username);
            }
            Err(err) => return Err(err),
        }
    }

    transaction.commit().await?;

    info!("Seeding completed, {} users created", created);

    Ok(created)
}

#[cfg(test)]
pub mod tests {
    #[::sqlx::test]
    async fn test_seed_is_idempotent(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;
        transaction.commit().await?;

        let now = crate::test_utils::at(2024, 1, 1);

        assert_eq!(crate::seeder::seed(&pool, &now).await?, 5);
        assert_eq!(crate::seeder::seed(&pool, &now).await?, 0);

        let mut transaction = pool.begin().await?;
        let stats = crate::sqlite::load_stats(&mut transaction).await?;
        transaction.commit().await?;

        assert_eq!(stats.total_users, 5);
        assert_eq!(stats.users_by_role[&crate::model::Role::Student], 3);

        Ok(())
    }
}
