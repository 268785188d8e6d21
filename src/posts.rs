use ::chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use ::log::*;

use crate::error::{ForumError, Result};
use crate::model::{
    Audience, GradeLevel, Post, PostDraft, PostType, User, VoteMonth,
};

const MAX_TITLE_LENGTH: usize = 200;

/// Body of a post creation request. Enumerations stay strings until
/// validation so that bad values surface as validation errors.
#[derive(Clone, Debug, Default, ::serde::Deserialize)]
pub(crate) struct NewPost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub post_type: Option<String>,
    pub grade_level: Option<String>,
    pub is_published: Option<bool>,
    pub expires_at: Option<String>,
}

fn present<'de, D, T>(
    deserializer: D,
) -> ::std::result::Result<Option<T>, D::Error>
where
    D: ::serde::Deserializer<'de>,
    T: ::serde::Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Body of a post update request. Absent fields are left alone, and a null
/// or empty `expires_at` clears the expiry.
#[derive(Clone, Debug, Default, ::serde::Deserialize)]
pub(crate) struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub grade_level: Option<String>,
    pub is_published: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub expires_at: Option<Option<String>>,
}

impl UpdatePost {
    pub(crate) fn changes(&self) -> Result<PostChanges> {
        let grade_level = match self.grade_level.as_deref().map(str::trim) {
            Some(value) => Some(value.parse::<Audience>()?),
            None => None,
        };

        let expires_at = match &self.expires_at {
            None => None,
            Some(None) => Some(None),
            Some(Some(value)) if value.trim().is_empty() => Some(None),
            Some(Some(value)) => Some(Some(parse_timestamp(value.trim())?)),
        };

        Ok(PostChanges {
            title: self.title.clone(),
            content: self.content.clone(),
            grade_level,
            is_published: self.is_published,
            expires_at,
        })
    }
}

/// Partial update of an existing post. `expires_at: Some(None)` clears the
/// expiry.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub grade_level: Option<Audience>,
    pub is_published: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// A post as shown to one viewer. Vote information is present for votable
/// articles only.
#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub is_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_votes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_has_voted: Option<bool>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ForumError::Validation(format!("{} is required", field))),
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ForumError::Validation("title is required".to_string()));
    }

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ForumError::Validation(format!(
            "title is longer than {} characters",
            MAX_TITLE_LENGTH
        )));
    }

    Ok(title.to_string())
}

/// Accepts RFC 3339 or a naive ISO 8601 timestamp taken as UTC.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| {
            ForumError::Validation(format!(
                "invalid expiration date format: {}",
                value
            ))
        })
}

impl NewPost {
    /// Checks posting rights and every field. Nothing is written.
    pub(crate) fn validate(&self, author: &User) -> Result<PostDraft> {
        if !author.can_post() {
            return Err(ForumError::Permission(
                "permission denied: role cannot create posts".to_string(),
            ));
        }

        let title = validate_title(required(&self.title, "title")?)?;
        let content = required(&self.content, "content")?.to_string();
        let post_type: PostType =
            required(&self.post_type, "post_type")?.parse()?;
        let grade_level: Audience =
            required(&self.grade_level, "grade_level")?.parse()?;

        if !post_type.may_be_authored_by(author.role) {
            return Err(ForumError::Permission(format!(
                "permission denied: {} cannot create {} posts",
                author.role.as_str(),
                post_type.as_str()
            )));
        }

        // expiry only means something for announcements
        let expires_at = match (post_type, self.expires_at.as_deref()) {
            (PostType::Announcement, Some(value)) if !value.is_empty() => {
                Some(parse_timestamp(value)?)
            }
            _ => None,
        };

        Ok(PostDraft {
            title,
            content,
            post_type,
            grade_level,
            is_published: self.is_published.unwrap_or(true),
            expires_at,
        })
    }
}

pub(crate) async fn create_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    author: &User,
    new_post: &NewPost,
    now: &DateTime<Utc>,
) -> Result<Post> {
    let draft = new_post.validate(author)?;

    let post =
        crate::sqlite::insert_post(transaction, author.id, &draft, now).await?;

    info!(
        "user {} created {} post {} for {}",
        author.id,
        post.post_type.as_str(),
        post.id,
        post.grade_level.as_str()
    );

    Ok(post)
}

async fn view_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    viewer: &User,
    post: Post,
    now: &DateTime<Utc>,
) -> Result<PostView> {
    let is_expired = post.is_expired(now);

    if !post.can_be_voted_on() {
        return Ok(PostView {
            post,
            is_expired,
            vote_count: None,
            total_votes: None,
            user_has_voted: None,
        });
    }

    let month = VoteMonth::containing(now);

    let vote_count =
        crate::sqlite::count_votes(transaction, post.id, Some(&month)).await?;
    let total_votes =
        crate::sqlite::count_votes(transaction, post.id, None).await?;
    let user_has_voted =
        crate::sqlite::has_voted(transaction, viewer.id, post.id, &month)
            .await?;

    Ok(PostView {
        post,
        is_expired,
        vote_count: Some(vote_count),
        total_votes: Some(total_votes),
        user_has_voted: Some(user_has_voted),
    })
}

/// Loads a post for `viewer`. Unpublished posts exist only for their
/// author and admins.
pub(crate) async fn get_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    viewer: &User,
    post_id: i64,
    now: &DateTime<Utc>,
) -> Result<PostView> {
    let not_found = || ForumError::NotFound(format!("post {} not found", post_id));

    let post = crate::sqlite::load_post(transaction, post_id)
        .await?
        .ok_or_else(not_found)?;

    if !post.is_published && !viewer.is_admin() && post.author_id != viewer.id
    {
        return Err(not_found());
    }

    if !post.is_accessible_by(viewer) {
        return Err(ForumError::Access("access denied".to_string()));
    }

    view_post(transaction, viewer, post, now).await
}

/// Published, unexpired posts visible to `viewer`, newest first. A
/// requested grade the viewer cannot see widens back to every grade they
/// can.
pub(crate) async fn list_visible_posts(
    transaction: &mut crate::sqlite::Transaction<'_>,
    viewer: &User,
    post_type: Option<PostType>,
    requested_grade: Option<GradeLevel>,
    now: &DateTime<Utc>,
) -> Result<::std::vec::Vec<PostView>> {
    let scope = crate::model::grade_scope(viewer, requested_grade)
        .unwrap_or_else(|_| crate::model::accessible_grades(viewer));

    let grade_scope = match scope.as_slice() {
        [grade] => Some(*grade),
        _ => None,
    };

    let posts = crate::sqlite::list_posts(
        transaction,
        &crate::sqlite::PostFilter {
            post_type,
            grade_scope,
            published_only: true,
            active_at: Some(*now),
        },
    )
    .await?;

    let mut result = vec![];

    for post in posts {
        result.push(view_post(transaction, viewer, post, now).await?);
    }

    Ok(result)
}

fn check_can_modify(actor: &User, post: &Post) -> Result<()> {
    if actor.can_moderate() || (actor.is_active && post.author_id == actor.id) {
        Ok(())
    } else {
        Err(ForumError::Permission(
            "permission denied: only the author or an admin may modify a post"
                .to_string(),
        ))
    }
}

pub(crate) async fn update_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    actor: &User,
    post_id: i64,
    changes: &PostChanges,
    now: &DateTime<Utc>,
) -> Result<Post> {
    let post = crate::sqlite::load_post(transaction, post_id)
        .await?
        .ok_or_else(|| {
            ForumError::NotFound(format!("post {} not found", post_id))
        })?;

    check_can_modify(actor, &post)?;

    let draft = PostDraft {
        title: match &changes.title {
            Some(title) => validate_title(title)?,
            None => post.title.clone(),
        },
        content: match &changes.content {
            Some(content) if content.trim().is_empty() => {
                return Err(ForumError::Validation(
                    "content is required".to_string(),
                ))
            }
            Some(content) => content.clone(),
            None => post.content.clone(),
        },
        post_type: post.post_type,
        grade_level: changes.grade_level.unwrap_or(post.grade_level),
        is_published: changes.is_published.unwrap_or(post.is_published),
        expires_at: changes.expires_at.unwrap_or(post.expires_at),
    };

    crate::sqlite::update_post(transaction, post_id, &draft, now).await?;

    info!("user {} updated post {}", actor.id, post_id);

    crate::sqlite::load_post(transaction, post_id)
        .await?
        .ok_or_else(|| ForumError::NotFound(format!("post {} not found", post_id)))
}

/// Removes the post together with its votes and any winner entry.
pub(crate) async fn delete_post(
    transaction: &mut crate::sqlite::Transaction<'_>,
    actor: &User,
    post_id: i64,
) -> Result<()> {
    let post = crate::sqlite::load_post(transaction, post_id)
        .await?
        .ok_or_else(|| {
            ForumError::NotFound(format!("post {} not found", post_id))
        })?;

    check_can_modify(actor, &post)?;

    crate::sqlite::delete_post(transaction, post_id).await?;

    info!("user {} deleted post {}", actor.id, post_id);

    Ok(())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::model::Role;

    fn article(grade_level: &str) -> NewPost {
        NewPost {
            title: Some("Dzongkha poetry".to_string()),
            content: Some("content".to_string()),
            post_type: Some("article".to_string()),
            grade_level: Some(grade_level.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn timestamps_parse_with_and_without_offset() {
        assert_eq!(
            parse_timestamp("2024-03-01T10:00:00Z").unwrap(),
            parse_timestamp("2024-03-01T10:00:00").unwrap()
        );
        assert_eq!(
            parse_timestamp("2024-03-01T16:00:00+06:00").unwrap(),
            parse_timestamp("2024-03-01 10:00:00").unwrap()
        );
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(ForumError::Validation(_))
        ));
    }

    #[test]
    fn update_bodies_distinguish_absent_and_cleared_expiry() {
        let parse = |body: &str| {
            ::serde_json::from_str::<UpdatePost>(body)
                .unwrap()
                .changes()
        };

        let untouched = parse(r#"{"title": "New title"}"#).unwrap();
        assert_eq!(untouched.title.as_deref(), Some("New title"));
        assert_eq!(untouched.expires_at, None);
        assert_eq!(untouched.grade_level, None);

        assert_eq!(parse(r#"{"expires_at": null}"#).unwrap().expires_at, Some(None));
        assert_eq!(parse(r#"{"expires_at": ""}"#).unwrap().expires_at, Some(None));
        assert_eq!(
            parse(r#"{"expires_at": "2024-03-01T12:00:00Z", "grade_level": "all"}"#)
                .unwrap(),
            PostChanges {
                grade_level: Some(Audience::All),
                expires_at: Some(Some(crate::test_utils::at(2024, 3, 1))),
                ..Default::default()
            }
        );

        assert!(matches!(
            parse(r#"{"grade_level": "kindergarten"}"#),
            Err(ForumError::Validation(_))
        ));
        assert!(matches!(
            parse(r#"{"expires_at": "soon"}"#),
            Err(ForumError::Validation(_))
        ));
    }

    #[::sqlx::test]
    async fn test_create_post_validates_fields_and_roles(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;

        let now = crate::test_utils::at(2024, 3, 1);

        let teacher = crate::test_utils::make_user(
            &mut transaction,
            "teacher",
            Role::Teacher,
            GradeLevel::Junior,
        )
        .await?;
        let language_teacher = crate::test_utils::make_user(
            &mut transaction,
            "language",
            Role::LanguageTeacher,
            GradeLevel::Junior,
        )
        .await?;

        assert!(matches!(
            create_post(&mut transaction, &teacher, &article("junior"), &now)
                .await,
            Err(ForumError::Permission(_))
        ));

        let mut missing_title = article("junior");
        missing_title.title = Some("   ".to_string());
        assert!(matches!(
            missing_title.validate(&language_teacher),
            Err(ForumError::Validation(_))
        ));

        let mut long_title = article("junior");
        long_title.title = Some("x".repeat(MAX_TITLE_LENGTH + 1));
        assert!(matches!(
            long_title.validate(&language_teacher),
            Err(ForumError::Validation(_))
        ));

        assert!(matches!(
            article("everyone").validate(&language_teacher),
            Err(ForumError::Validation(_))
        ));

        let mut bad_type = article("junior");
        bad_type.post_type = Some("essay".to_string());
        assert!(matches!(
            bad_type.validate(&language_teacher),
            Err(ForumError::Validation(_))
        ));

        let mut note = article("all");
        note.post_type = Some("principal_note".to_string());
        let post =
            create_post(&mut transaction, &language_teacher, &note, &now)
                .await?;

        transaction.commit().await?;

        assert_eq!(post.post_type, PostType::PrincipalNote);
        assert_eq!(post.grade_level, Audience::All);
        assert!(post.is_published);
        assert_eq!(post.author_id, language_teacher.id);

        Ok(())
    }

    #[::sqlx::test]
    async fn test_expiry_only_applies_to_announcements(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;

        let now = crate::test_utils::at(2024, 3, 1);

        let admin = crate::test_utils::make_user(
            &mut transaction,
            "admin",
            Role::Admin,
            GradeLevel::Senior,
        )
        .await?;

        let mut with_expiry = article("senior");
        with_expiry.expires_at = Some("2024-03-10T00:00:00Z".to_string());

        let plain =
            create_post(&mut transaction, &admin, &with_expiry, &now).await?;
        assert_eq!(plain.expires_at, None);

        with_expiry.post_type = Some("announcement".to_string());
        let announcement =
            create_post(&mut transaction, &admin, &with_expiry, &now).await?;
        assert_eq!(
            announcement.expires_at,
            Some(parse_timestamp("2024-03-10T00:00:00Z")?)
        );

        with_expiry.expires_at = Some("soon".to_string());
        assert!(matches!(
            create_post(&mut transaction, &admin, &with_expiry, &now).await,
            Err(ForumError::Validation(_))
        ));

        transaction.commit().await?;
        Ok(())
    }

    #[::sqlx::test]
    async fn test_get_post_enforces_grade_and_publication(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;

        let now = crate::test_utils::at(2024, 3, 5);
        let month: VoteMonth = "2024-03".parse()?;

        let author = crate::test_utils::make_user(
            &mut transaction,
            "author",
            Role::LanguageTeacher,
            GradeLevel::Senior,
        )
        .await?;
        let junior = crate::test_utils::make_user(
            &mut transaction,
            "junior",
            Role::Student,
            GradeLevel::Junior,
        )
        .await?;
        let senior = crate::test_utils::make_user(
            &mut transaction,
            "senior",
            Role::Student,
            GradeLevel::Senior,
        )
        .await?;

        let post = crate::test_utils::make_post(
            &mut transaction,
            &author,
            PostType::Article,
            Audience::Senior,
        )
        .await?;
        crate::test_utils::add_votes(
            &mut transaction,
            &[senior.clone()],
            &post,
            &month,
        )
        .await?;

        assert!(matches!(
            get_post(&mut transaction, &junior, post.id, &now).await,
            Err(ForumError::Access(_))
        ));
        assert!(matches!(
            get_post(&mut transaction, &junior, post.id + 100, &now).await,
            Err(ForumError::NotFound(_))
        ));

        let view = get_post(&mut transaction, &senior, post.id, &now).await?;
        assert_eq!(view.vote_count, Some(1));
        assert_eq!(view.total_votes, Some(1));
        assert_eq!(view.user_has_voted, Some(true));
        assert!(!view.is_expired);

        update_post(
            &mut transaction,
            &author,
            post.id,
            &PostChanges {
                is_published: Some(false),
                ..Default::default()
            },
            &now,
        )
        .await?;

        assert!(matches!(
            get_post(&mut transaction, &senior, post.id, &now).await,
            Err(ForumError::NotFound(_))
        ));

        let hidden = get_post(&mut transaction, &author, post.id, &now).await?;
        assert!(!hidden.post.is_published);
        assert_eq!(hidden.vote_count, None);

        transaction.commit().await?;
        Ok(())
    }

    #[::sqlx::test]
    async fn test_list_visible_posts_scopes_to_accessible_grades(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;

        let now = crate::test_utils::at(2024, 3, 5);

        let admin = crate::test_utils::make_user(
            &mut transaction,
            "admin",
            Role::Admin,
            GradeLevel::Junior,
        )
        .await?;
        let parent = crate::test_utils::make_user(
            &mut transaction,
            "parent",
            Role::Parent,
            GradeLevel::Middle,
        )
        .await?;

        for audience in Audience::ALL {
            crate::test_utils::make_post(
                &mut transaction,
                &admin,
                PostType::Article,
                audience,
            )
            .await?;
        }

        let expired = create_post(
            &mut transaction,
            &admin,
            &NewPost {
                title: Some("Exam timetable".to_string()),
                content: Some("content".to_string()),
                post_type: Some("announcement".to_string()),
                grade_level: Some("middle".to_string()),
                is_published: None,
                expires_at: Some("2024-03-01T00:00:00Z".to_string()),
            },
            &crate::test_utils::at(2024, 2, 20),
        )
        .await?;

        let grades = |views: &[PostView]| {
            let mut grades = views
                .iter()
                .map(|view| view.post.grade_level)
                .collect::<::std::vec::Vec<_>>();
            grades.sort();
            grades
        };

        let seen_by_parent =
            list_visible_posts(&mut transaction, &parent, None, None, &now)
                .await?;
        assert_eq!(
            grades(&seen_by_parent),
            vec![Audience::Middle, Audience::All]
        );
        assert!(seen_by_parent.iter().all(|view| view.post.id != expired.id));

        // an inaccessible grade falls back to the parent's own grades
        let fallback = list_visible_posts(
            &mut transaction,
            &parent,
            None,
            Some(GradeLevel::Senior),
            &now,
        )
        .await?;
        assert_eq!(grades(&fallback), grades(&seen_by_parent));

        let seen_by_admin =
            list_visible_posts(&mut transaction, &admin, None, None, &now)
                .await?;
        assert_eq!(seen_by_admin.len(), Audience::ALL.len());

        let admin_senior = list_visible_posts(
            &mut transaction,
            &admin,
            Some(PostType::Article),
            Some(GradeLevel::Senior),
            &now,
        )
        .await?;
        assert_eq!(
            grades(&admin_senior),
            vec![Audience::Senior, Audience::All]
        );
        assert!(admin_senior
            .iter()
            .all(|view| view.user_has_voted == Some(false)));

        transaction.commit().await?;
        Ok(())
    }

    #[::sqlx::test]
    async fn test_only_author_or_admin_modifies_posts(
        pool: ::sqlx::SqlitePool,
    ) -> ::anyhow::Result<()> {
        let mut transaction = pool.begin().await?;
        crate::sqlite::prepare_database(&mut transaction).await?;

        let now = crate::test_utils::at(2024, 3, 5);

        let author = crate::test_utils::make_user(
            &mut transaction,
            "author",
            Role::LanguageTeacher,
            GradeLevel::Middle,
        )
        .await?;
        let colleague = crate::test_utils::make_user(
            &mut transaction,
            "colleague",
            Role::LanguageTeacher,
            GradeLevel::Middle,
        )
        .await?;
        let admin = crate::test_utils::make_user(
            &mut transaction,
            "admin",
            Role::Admin,
            GradeLevel::Middle,
        )
        .await?;

        let post = crate::test_utils::make_post(
            &mut transaction,
            &author,
            PostType::Article,
            Audience::Middle,
        )
        .await?;

        let retitle = PostChanges {
            title: Some("Revised".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            update_post(&mut transaction, &colleague, post.id, &retitle, &now)
                .await,
            Err(ForumError::Permission(_))
        ));

        let updated =
            update_post(&mut transaction, &author, post.id, &retitle, &now)
                .await?;
        assert_eq!(updated.title, "Revised");
        assert_eq!(updated.updated_at, now);

        assert!(matches!(
            delete_post(&mut transaction, &colleague, post.id).await,
            Err(ForumError::Permission(_))
        ));

        delete_post(&mut transaction, &admin, post.id).await?;

        assert!(matches!(
            delete_post(&mut transaction, &admin, post.id).await,
            Err(ForumError::NotFound(_))
        ));

        transaction.commit().await?;
        Ok(())
    }
}
