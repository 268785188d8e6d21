use ::chrono::{DateTime, Utc};

use crate::model::{GradeLevel, NewUser, Role, User};

#[derive(::sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    role: Role,
    grade_level: GradeLevel,
    first_name: String,
    last_name: String,
    created_at: i64,
    is_active: bool,
}

impl UserRow {
    fn into_user(self) -> ::sqlx::Result<User> {
        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            role: self.role,
            grade_level: self.grade_level,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: crate::sqlite::from_unix_milliseconds(self.created_at)?,
            is_active: self.is_active,
        })
    }
}

pub(crate) async fn insert_user(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user: &NewUser,
    now: &DateTime<Utc>,
) -> ::sqlx::Result<User> {
    let query = "
        INSERT INTO users (
            username,
            email,
            role,
            grade_level,
            first_name,
            last_name,
            created_at,
            is_active
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 1);
    ";

    let result = ::sqlx::query(query)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.grade_level)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(crate::sqlite::to_unix_milliseconds(now))
        .execute(&mut **transaction)
        .await?;

    load_user(transaction, result.last_insert_rowid())
        .await?
        .ok_or(::sqlx::Error::RowNotFound)
}

pub(crate) async fn load_user(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user_id: i64,
) -> ::sqlx::Result<Option<User>> {
    let query = "
        SELECT
            id,
            username,
            email,
            role,
            grade_level,
            first_name,
            last_name,
            created_at,
            is_active
        FROM
            users
        WHERE
            id = $1;
    ";

    ::sqlx::query_as::<_, UserRow>(query)
        .bind(user_id)
        .fetch_optional(&mut **transaction)
        .await?
        .map(UserRow::into_user)
        .transpose()
}

pub(crate) async fn delete_user(
    transaction: &mut crate::sqlite::Transaction<'_>,
    user_id: i64,
) -> ::sqlx::Result<bool> {
    let result = ::sqlx::query("DELETE FROM users WHERE id = $1;")
        .bind(user_id)
        .execute(&mut **transaction)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub mod tests {
    use crate::model::{GradeLevel, NewUser, Role};

    #[::sqlx::test]
    async fn test_insert_and_load_user(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;

        let now = crate::test_utils::at(2024, 1, 2);

        let inserted = crate::sqlite::insert_user(
            &mut transaction,
            &NewUser {
                username: "karma".to_string(),
                email: "karma@school.bt".to_string(),
                role: Role::LanguageTeacher,
                grade_level: GradeLevel::Middle,
                first_name: "Karma".to_string(),
                last_name: "Wangmo".to_string(),
            },
            &now,
        )
        .await?;

        let loaded =
            crate::sqlite::load_user(&mut transaction, inserted.id).await?;

        transaction.commit().await?;

        assert_eq!(Some(inserted.clone()), loaded);
        assert_eq!(inserted.role, Role::LanguageTeacher);
        assert_eq!(inserted.created_at, now);
        assert!(inserted.is_active);

        Ok(())
    }

    #[::sqlx::test]
    async fn test_duplicate_email_violates_unique_constraint(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;

        let now = crate::test_utils::at(2024, 1, 2);

        let mut user = NewUser {
            username: "first".to_string(),
            email: "same@school.bt".to_string(),
            role: Role::Student,
            grade_level: GradeLevel::Junior,
            first_name: "First".to_string(),
            last_name: "Student".to_string(),
        };

        crate::sqlite::insert_user(&mut transaction, &user, &now).await?;

        user.username = "second".to_string();

        let err = crate::sqlite::insert_user(&mut transaction, &user, &now)
            .await
            .unwrap_err();

        assert!(matches!(
            crate::error::ForumError::conflict_on_unique(err, "duplicate"),
            crate::error::ForumError::Conflict(_)
        ));

        Ok(())
    }
}
